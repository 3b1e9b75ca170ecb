//! GPS export: device tracker coordinates into `gps_points`
//!
//! Every recorder state whose attributes carry both coordinates becomes one
//! row keyed on its source `state_id`. There is no watermark; re-running
//! rewrites the same rows.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::attributes::extract_coordinates;
use crate::config::GpsSyncConfig;
use crate::error::SyncError;
use crate::recorder::{epoch_to_datetime, CoordinateScan, RecorderReader, RecorderRow};
use crate::sink::{parse_dsn, BatchWriter, MySqlSink, SinkBackend, SqlValue, UpsertTable};

#[derive(Debug, Clone, PartialEq)]
pub struct GpsRow {
    pub state_id: i64,
    pub entity_id: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// `gps_points`, keyed on `state_id`
pub struct GpsTable;

impl UpsertTable for GpsTable {
    type Row = GpsRow;

    const TABLE: &'static str = "gps_points";

    const COLUMNS: &'static [&'static str] = &[
        "state_id",
        "entity_id",
        "state",
        "latitude",
        "longitude",
        "gps_accuracy",
        "last_updated",
    ];

    const UPDATE_COLUMNS: &'static [&'static str] = &[
        "entity_id",
        "state",
        "latitude",
        "longitude",
        "gps_accuracy",
        "last_updated",
    ];

    fn bind(row: &GpsRow, args: &mut Vec<SqlValue>) {
        args.push(SqlValue::Int(Some(row.state_id)));
        args.push(SqlValue::Text(Some(row.entity_id.clone())));
        args.push(SqlValue::Text(Some(row.state.clone())));
        args.push(SqlValue::Float(Some(row.latitude)));
        args.push(SqlValue::Float(Some(row.longitude)));
        args.push(SqlValue::Float(row.accuracy));
        args.push(SqlValue::DateTime(row.last_updated.map(|ts| ts.naive_utc())));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GpsSummary {
    pub scanned: usize,
    /// Payloads without both latitude and longitude
    pub skipped: usize,
    pub rows_written: usize,
    pub statements: usize,
}

pub struct GpsSync<S: SinkBackend> {
    writer: BatchWriter<GpsTable, S>,
    cancel: CancellationToken,
    summary: GpsSummary,
}

impl<S: SinkBackend> GpsSync<S> {
    pub fn new(sink: S, cancel: CancellationToken) -> Self {
        Self {
            writer: BatchWriter::new(sink, cancel.clone()),
            cancel,
            summary: GpsSummary::default(),
        }
    }

    pub async fn run(&mut self, reader: &mut RecorderReader) -> Result<GpsSummary, SyncError> {
        let mut scan = CoordinateScan::default();

        loop {
            if self.cancel.is_cancelled() {
                log::warn!("🛑 GPS export cancelled after {} rows", self.summary.scanned);
                return Err(SyncError::Cancelled);
            }

            let page = reader.next_coordinate_page(&mut scan)?;
            if page.is_empty() {
                break;
            }

            for row in page {
                self.process_row(row).await?;
            }
        }

        self.finish().await
    }

    pub async fn process_row(&mut self, row: RecorderRow) -> Result<(), SyncError> {
        self.summary.scanned += 1;

        let coordinates = extract_coordinates(&row.shared_attrs).map_err(|source| SyncError::Attributes {
            state_id: row.state_id,
            source,
        })?;
        let Some((latitude, longitude)) = coordinates.position() else {
            self.summary.skipped += 1;
            return Ok(());
        };

        let last_updated = epoch_to_datetime(row.last_updated_ts).map_err(|source| SyncError::Timestamp {
            state_id: row.state_id,
            source,
        })?;

        let gps_row = GpsRow {
            state_id: row.state_id,
            entity_id: row.entity_id,
            state: row.state,
            latitude,
            longitude,
            accuracy: coordinates.accuracy,
            last_updated,
        };
        self.writer.append(&gps_row).await?;
        Ok(())
    }

    pub async fn finish(&mut self) -> Result<GpsSummary, SyncError> {
        self.writer.flush().await?;

        self.summary.rows_written = self.writer.rows_written();
        self.summary.statements = self.writer.statements_executed();

        log::info!(
            "✅ GPS export complete: {} scanned, {} without coordinates, {} rows in {} statements",
            self.summary.scanned,
            self.summary.skipped,
            self.summary.rows_written,
            self.summary.statements
        );

        Ok(self.summary.clone())
    }

    pub fn sink(&self) -> &S {
        self.writer.sink()
    }

    pub fn into_sink(self) -> S {
        self.writer.into_sink()
    }
}

/// Run a full GPS export against the configured recorder and sink
pub async fn export_gps(config: &GpsSyncConfig, cancel: CancellationToken) -> Result<GpsSummary, SyncError> {
    config.validate()?;
    let options = parse_dsn(&config.dsn)?;

    log::info!("🛰️ Exporting GPS coordinates from {}", config.sqlite_path.display());

    let mut reader = RecorderReader::open(&config.sqlite_path)?.with_page_size(config.page_size);

    let sink = MySqlSink::connect(options).await?;
    sink.ensure_gps_points_table().await?;

    let mut sync = GpsSync::new(sink, cancel);
    let summary = sync.run(&mut reader).await?;

    sync.into_sink().close().await;
    Ok(summary)
}
