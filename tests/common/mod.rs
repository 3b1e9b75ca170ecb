//! Shared fixtures: a temporary recorder database and an in-memory sink
//! that applies upserts the way MySQL would.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use hass_export::energy::WatermarkQuery;
use hass_export::sink::{SinkBackend, SinkError, SqlValue, UpsertStatement};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stored `energy_points` row
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyPoint {
    pub state: String,
    pub numeric_state: Option<f64>,
    pub friendly_name: Option<String>,
    pub last_updated: Option<NaiveDateTime>,
}

/// Stored `gps_points` row
#[derive(Debug, Clone, PartialEq)]
pub struct GpsPoint {
    pub entity_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

/// In-memory stand-in for the MySQL sink
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Keyed on `(entity_id, source_state_id)`
    pub energy: BTreeMap<(String, i64), EnergyPoint>,
    /// Keyed on `state_id`
    pub gps: BTreeMap<i64, GpsPoint>,
    pub statements: usize,
    pub inserted: usize,
    pub updated: usize,
}

impl MemorySink {
    fn apply_energy(&mut self, args: &[SqlValue]) {
        for chunk in args.chunks(9) {
            let key = (text(&chunk[1]).unwrap_or_default(), int(&chunk[0]).unwrap_or_default());
            let point = EnergyPoint {
                state: text(&chunk[2]).unwrap_or_default(),
                numeric_state: float(&chunk[3]),
                friendly_name: text(&chunk[7]),
                last_updated: datetime(&chunk[8]).map(datetime6),
            };
            match self.energy.insert(key, point) {
                Some(_) => self.updated += 1,
                None => self.inserted += 1,
            }
        }
    }

    fn apply_gps(&mut self, args: &[SqlValue]) {
        for chunk in args.chunks(7) {
            let point = GpsPoint {
                entity_id: text(&chunk[1]).unwrap_or_default(),
                latitude: float(&chunk[3]),
                longitude: float(&chunk[4]),
                accuracy: float(&chunk[5]),
            };
            match self.gps.insert(int(&chunk[0]).unwrap_or_default(), point) {
                Some(_) => self.updated += 1,
                None => self.inserted += 1,
            }
        }
    }

    pub fn energy_point(&self, entity_id: &str, source_state_id: i64) -> Option<&EnergyPoint> {
        self.energy.get(&(entity_id.to_string(), source_state_id))
    }
}

fn int(value: &SqlValue) -> Option<i64> {
    match value {
        SqlValue::Int(v) => *v,
        _ => None,
    }
}

fn float(value: &SqlValue) -> Option<f64> {
    match value {
        SqlValue::Float(v) => *v,
        _ => None,
    }
}

fn text(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Text(v) => v.clone(),
        _ => None,
    }
}

fn datetime(value: &SqlValue) -> Option<NaiveDateTime> {
    match value {
        SqlValue::DateTime(v) => *v,
        _ => None,
    }
}

/// MySQL `DATETIME(6)` keeps microseconds and truncates the rest
fn datetime6(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(ts.nanosecond() / 1_000 * 1_000).unwrap()
}

#[async_trait]
impl SinkBackend for MemorySink {
    async fn execute(&mut self, statement: &UpsertStatement) -> Result<u64, SinkError> {
        if statement.sql.starts_with("INSERT INTO energy_points(") {
            self.apply_energy(&statement.args);
        } else if statement.sql.starts_with("INSERT INTO gps_points(") {
            self.apply_gps(&statement.args);
        } else {
            return Err(SinkError::Rejected(format!("unknown table in {}", statement.sql)));
        }
        self.statements += 1;
        Ok(statement.rows as u64)
    }

    fn backend_type(&self) -> &'static str {
        "Memory"
    }
}

#[async_trait]
impl WatermarkQuery for MemorySink {
    async fn latest_per_entity(&mut self) -> Result<Vec<(String, Option<DateTime<Utc>>)>, SinkError> {
        let mut latest: BTreeMap<String, Option<NaiveDateTime>> = BTreeMap::new();
        for ((entity_id, _), point) in &self.energy {
            let slot = latest.entry(entity_id.clone()).or_insert(None);
            if point.last_updated > *slot {
                *slot = point.last_updated;
            }
        }
        Ok(latest
            .into_iter()
            .map(|(entity_id, ts)| (entity_id, ts.map(|t| t.and_utc())))
            .collect())
    }
}

/// Recorder database in a temporary directory
pub struct RecorderFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl RecorderFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("home-assistant_v2.db");

        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE states_meta (
                metadata_id INTEGER PRIMARY KEY,
                entity_id TEXT
            );
            CREATE TABLE state_attributes (
                attributes_id INTEGER PRIMARY KEY,
                shared_attrs TEXT
            );
            CREATE TABLE states (
                state_id INTEGER PRIMARY KEY,
                metadata_id INTEGER,
                state TEXT,
                last_updated_ts REAL,
                attributes_id INTEGER
            );",
        )
        .unwrap();

        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn insert(&self, state_id: i64, entity_id: &str, state: &str, ts: Option<f64>, attrs: Option<&str>) {
        let conn = Connection::open(&self.path).unwrap();

        let existing: Option<i64> = conn
            .query_row(
                "SELECT metadata_id FROM states_meta WHERE entity_id = ?1",
                params![entity_id],
                |row| row.get(0),
            )
            .ok();
        let metadata_id = match existing {
            Some(id) => id,
            None => {
                conn.execute("INSERT INTO states_meta (entity_id) VALUES (?1)", params![entity_id])
                    .unwrap();
                conn.last_insert_rowid()
            }
        };

        let attributes_id = attrs.map(|shared| {
            conn.execute(
                "INSERT INTO state_attributes (shared_attrs) VALUES (?1)",
                params![shared],
            )
            .unwrap();
            conn.last_insert_rowid()
        });

        conn.execute(
            "INSERT INTO states (state_id, metadata_id, state, last_updated_ts, attributes_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![state_id, metadata_id, state, ts, attributes_id],
        )
        .unwrap();
    }
}
