//! MySQL / TiDB sink backend
//!
//! Owns a single-connection sqlx pool. Statements run one at a time, so a
//! second connection would never be used.

use super::{SinkBackend, SinkError, SqlValue, UpsertStatement};
use crate::energy::watermark::WatermarkQuery;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions};
use std::collections::BTreeMap;

const ER_DUP_FIELDNAME: u16 = 1060;
const ER_DUP_KEYNAME: u16 = 1061;
const ER_CANT_DROP_FIELD_OR_KEY: u16 = 1091;

const ENERGY_POINTS_DDL: &str = "
CREATE TABLE IF NOT EXISTS energy_points (
    state_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    source_state_id BIGINT NULL,
    entity_id VARCHAR(255) NOT NULL,
    state VARCHAR(255) NOT NULL,
    numeric_state DOUBLE NULL,
    unit VARCHAR(64) NULL,
    device_class VARCHAR(64) NULL,
    state_class VARCHAR(64) NULL,
    friendly_name VARCHAR(255) NULL,
    last_updated DATETIME(6) NULL
)";

const GPS_POINTS_DDL: &str = "
CREATE TABLE IF NOT EXISTS gps_points (
    state_id BIGINT PRIMARY KEY,
    entity_id VARCHAR(255) NOT NULL,
    state VARCHAR(255) NOT NULL,
    latitude DOUBLE NOT NULL,
    longitude DOUBLE NOT NULL,
    gps_accuracy DOUBLE NULL,
    last_updated DATETIME(6) NULL
)";

pub struct MySqlSink {
    pool: MySqlPool,
}

impl MySqlSink {
    /// Connect and verify the server is reachable
    pub async fn connect(options: MySqlConnectOptions) -> Result<Self, SinkError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        log::info!("✅ MySQL sink connected");

        Ok(Self { pool })
    }

    /// Create `energy_points` and bring legacy tables up to date
    ///
    /// Idempotent: re-adding an existing column or index is ignored.
    pub async fn ensure_energy_points_table(&self) -> Result<(), SinkError> {
        sqlx::query(ENERGY_POINTS_DDL).execute(&self.pool).await?;

        sqlx::query("ALTER TABLE energy_points MODIFY COLUMN state_id BIGINT NOT NULL AUTO_INCREMENT")
            .execute(&self.pool)
            .await?;

        // Early exports copied the raw attribute payload
        self.execute_tolerating(
            "ALTER TABLE energy_points DROP COLUMN attributes",
            ER_CANT_DROP_FIELD_OR_KEY,
        )
        .await?;

        // Tables created before source tracking lack the column
        self.execute_tolerating(
            "ALTER TABLE energy_points ADD COLUMN source_state_id BIGINT NULL AFTER state_id",
            ER_DUP_FIELDNAME,
        )
        .await?;

        self.execute_tolerating(
            "ALTER TABLE energy_points
             ADD UNIQUE INDEX uq_energy_points_entity_source (entity_id, source_state_id)",
            ER_DUP_KEYNAME,
        )
        .await?;

        self.execute_tolerating(
            "ALTER TABLE energy_points
             ADD INDEX idx_energy_points_entity_last_updated (entity_id, last_updated)",
            ER_DUP_KEYNAME,
        )
        .await?;

        log::info!("📊 energy_points table ready");
        Ok(())
    }

    /// Create `gps_points` and repair legacy keys
    ///
    /// Upserts must resolve on `state_id` alone. An older primary key or a
    /// unique index on `entity_id` would fold every coordinate of a tracker
    /// into a single row.
    pub async fn ensure_gps_points_table(&self) -> Result<(), SinkError> {
        sqlx::query(GPS_POINTS_DDL).execute(&self.pool).await?;

        let indexes = self.table_indexes("gps_points").await?;

        if !has_primary_key_on(&indexes, "state_id") {
            log::warn!("🔧 gps_points primary key is not state_id, rebuilding it");
            self.execute_tolerating("ALTER TABLE gps_points DROP PRIMARY KEY", ER_CANT_DROP_FIELD_OR_KEY)
                .await?;
            sqlx::query("ALTER TABLE gps_points ADD PRIMARY KEY (state_id)")
                .execute(&self.pool)
                .await?;
        }

        for name in conflicting_unique_indexes(&indexes, "entity_id", "state_id") {
            log::warn!("🔧 Dropping unique index {} on gps_points", name);
            sqlx::query(&format!("ALTER TABLE gps_points DROP INDEX {}", quote_identifier(&name)))
                .execute(&self.pool)
                .await?;
        }

        self.execute_tolerating(
            "ALTER TABLE gps_points
             ADD INDEX idx_gps_points_entity_last_updated (entity_id, last_updated)",
            ER_DUP_KEYNAME,
        )
        .await?;

        log::info!("📊 gps_points table ready");
        Ok(())
    }

    /// Index layout of a table in the current database
    async fn table_indexes(&self, table: &str) -> Result<BTreeMap<String, IndexInfo>, SinkError> {
        let rows: Vec<(String, Option<String>, i64)> = sqlx::query_as(
            "SELECT CAST(INDEX_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR), CAST(NON_UNIQUE AS SIGNED)
             FROM INFORMATION_SCHEMA.STATISTICS
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
             ORDER BY INDEX_NAME, SEQ_IN_INDEX",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(collect_indexes(rows))
    }

    async fn execute_tolerating(&self, sql: &str, tolerated: u16) -> Result<(), SinkError> {
        match sqlx::query(sql).execute(&self.pool).await {
            Ok(_) => Ok(()),
            Err(err) if is_mysql_error(&err, tolerated) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Columns of one index, in key order
#[derive(Debug, Clone, Default, PartialEq)]
struct IndexInfo {
    unique: bool,
    columns: Vec<String>,
}

fn collect_indexes(rows: Vec<(String, Option<String>, i64)>) -> BTreeMap<String, IndexInfo> {
    let mut indexes: BTreeMap<String, IndexInfo> = BTreeMap::new();
    for (name, column, non_unique) in rows {
        // Functional key parts have no column name
        let Some(column) = column else { continue };
        let info = indexes.entry(name).or_insert_with(|| IndexInfo {
            unique: non_unique == 0,
            columns: Vec::new(),
        });
        info.columns.push(column);
    }
    indexes
}

fn has_primary_key_on(indexes: &BTreeMap<String, IndexInfo>, column: &str) -> bool {
    indexes
        .get("PRIMARY")
        .is_some_and(|pk| pk.columns.len() == 1 && pk.columns[0] == column)
}

/// Unique secondary indexes covering `column` but not `key_column`
fn conflicting_unique_indexes(
    indexes: &BTreeMap<String, IndexInfo>,
    column: &str,
    key_column: &str,
) -> Vec<String> {
    indexes
        .iter()
        .filter(|(name, info)| name.as_str() != "PRIMARY" && info.unique)
        .filter(|(_, info)| {
            info.columns.iter().any(|c| c == column) && !info.columns.iter().any(|c| c == key_column)
        })
        .map(|(name, _)| name.clone())
        .collect()
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn is_mysql_error(err: &sqlx::Error, code: u16) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|e| e.number() == code)
            .unwrap_or(false),
        _ => false,
    }
}

#[async_trait]
impl SinkBackend for MySqlSink {
    async fn execute(&mut self, statement: &UpsertStatement) -> Result<u64, SinkError> {
        let mut query = sqlx::query(&statement.sql);
        for arg in &statement.args {
            query = match arg {
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::Float(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_deref()),
                SqlValue::DateTime(v) => query.bind(*v),
            };
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    fn backend_type(&self) -> &'static str {
        "MySQL"
    }
}

#[async_trait]
impl WatermarkQuery for MySqlSink {
    async fn latest_per_entity(&mut self) -> Result<Vec<(String, Option<DateTime<Utc>>)>, SinkError> {
        let rows: Vec<(String, Option<NaiveDateTime>)> = sqlx::query_as(
            "SELECT entity_id, MAX(last_updated)
             FROM energy_points
             GROUP BY entity_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(entity_id, ts)| (entity_id, ts.map(|t| t.and_utc())))
            .collect())
    }
}
