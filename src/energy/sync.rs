//! Energy export driver
//!
//! ```text
//! RecorderReader → watermark filter → metadata → MinuteAverager ─┐
//!                                              └─ pass-through ──┴→ BatchWriter → sink
//! ```
//!
//! A pass-through reading closes any open minute group first, so output rows
//! keep the source order per entity.

use tokio_util::sync::CancellationToken;

use super::averager::MinuteAverager;
use super::table::EnergyTable;
use super::types::{EnergyRow, Reading, Sample};
use super::watermark::Watermarks;
use crate::attributes::{extract_energy_metadata, parse_numeric};
use crate::config::EnergySyncConfig;
use crate::error::SyncError;
use crate::recorder::{epoch_to_datetime, EntityScan, RecorderReader, RecorderRow};
use crate::sink::{BatchWriter, SinkBackend};

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub scanned: usize,
    /// Already present in the sink according to the watermark
    pub skipped: usize,
    /// Readings folded into a minute group
    pub aggregated: usize,
    pub passed_through: usize,
    pub emitted_aggregates: usize,
    pub rows_written: usize,
    pub statements: usize,
}

pub struct EnergySync<S: SinkBackend> {
    config: EnergySyncConfig,
    watermarks: Watermarks,
    averager: MinuteAverager,
    writer: BatchWriter<EnergyTable, S>,
    cancel: CancellationToken,
    summary: SyncSummary,
}

impl<S: SinkBackend> EnergySync<S> {
    pub fn new(
        config: EnergySyncConfig,
        watermarks: Watermarks,
        sink: S,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            watermarks,
            averager: MinuteAverager::new(),
            writer: BatchWriter::new(sink, cancel.clone()),
            cancel,
            summary: SyncSummary::default(),
        }
    }

    /// Scan every matching entity, then flush
    ///
    /// Cancellation between pages returns early without flushing the open
    /// minute group or the pending batch.
    pub async fn run(&mut self, reader: &mut RecorderReader) -> Result<SyncSummary, SyncError> {
        let mut scan = EntityScan::matching(&self.config.entity);

        loop {
            if self.cancel.is_cancelled() {
                log::warn!("🛑 Energy export cancelled after {} rows", self.summary.scanned);
                return Err(SyncError::Cancelled);
            }

            let page = reader.next_entity_page(&mut scan)?;
            if page.is_empty() {
                break;
            }

            for row in page {
                self.process_row(row).await?;
            }
        }

        self.finish().await
    }

    /// Route one recorder row; rows must arrive in entity scan order
    pub async fn process_row(&mut self, row: RecorderRow) -> Result<(), SyncError> {
        self.summary.scanned += 1;

        let observed_at = epoch_to_datetime(row.last_updated_ts).map_err(|source| SyncError::Timestamp {
            state_id: row.state_id,
            source,
        })?;

        if let Some(ts) = observed_at {
            if self.watermarks.is_synced(&row.entity_id, ts) {
                self.summary.skipped += 1;
                return Ok(());
            }
        }

        let metadata = extract_energy_metadata(&row.shared_attrs).map_err(|source| SyncError::Attributes {
            state_id: row.state_id,
            source,
        })?;

        let reading = Reading {
            source_row_id: row.state_id,
            numeric_value: parse_numeric(&row.state),
            entity_id: row.entity_id,
            raw_value: row.state,
            metadata,
            observed_at,
        };

        let reading = if self.config.needs_minute_average(&reading.entity_id) {
            match Sample::from_reading(reading) {
                Ok(sample) => {
                    self.summary.aggregated += 1;
                    if let Some(average) = self.averager.add(sample) {
                        self.emit_aggregate(average).await?;
                    }
                    return Ok(());
                }
                Err(reading) => reading,
            }
        } else {
            reading
        };

        if let Some(average) = self.averager.flush() {
            self.emit_aggregate(average).await?;
        }

        self.summary.passed_through += 1;
        self.append(reading.into()).await
    }

    /// Flush the open minute group and the pending batch
    pub async fn finish(&mut self) -> Result<SyncSummary, SyncError> {
        if let Some(average) = self.averager.flush() {
            self.emit_aggregate(average).await?;
        }
        self.writer.flush().await?;

        self.summary.rows_written = self.writer.rows_written();
        self.summary.statements = self.writer.statements_executed();

        log::info!(
            "✅ Energy export complete: {} scanned, {} skipped, {} averaged into {} rows, {} passed through, {} rows in {} statements",
            self.summary.scanned,
            self.summary.skipped,
            self.summary.aggregated,
            self.summary.emitted_aggregates,
            self.summary.passed_through,
            self.summary.rows_written,
            self.summary.statements
        );

        Ok(self.summary.clone())
    }

    async fn emit_aggregate(&mut self, row: EnergyRow) -> Result<(), SyncError> {
        self.summary.emitted_aggregates += 1;
        self.append(row).await
    }

    async fn append(&mut self, row: EnergyRow) -> Result<(), SyncError> {
        self.writer.append(&row).await?;
        if let Some(ts) = row.observed_at {
            self.watermarks.advance(&row.entity_id, ts);
        }
        Ok(())
    }

    pub fn watermarks(&self) -> &Watermarks {
        &self.watermarks
    }

    pub fn summary(&self) -> &SyncSummary {
        &self.summary
    }

    pub fn sink(&self) -> &S {
        self.writer.sink()
    }

    pub fn into_sink(self) -> S {
        self.writer.into_sink()
    }
}
