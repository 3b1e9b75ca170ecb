//! Energy export: smart socket telemetry into `energy_points`
//!
//! Voltage and current sensors report several times a minute; those are
//! folded into one averaged row per entity and minute. Everything else
//! (power, energy totals, switch states) is copied as-is.

pub mod averager;
pub mod sync;
pub mod table;
pub mod types;
pub mod watermark;

pub use averager::MinuteAverager;
pub use sync::{EnergySync, SyncSummary};
pub use table::EnergyTable;
pub use types::{EnergyRow, Reading, Sample};
pub use watermark::{WatermarkQuery, Watermarks};

use tokio_util::sync::CancellationToken;

use crate::config::EnergySyncConfig;
use crate::error::SyncError;
use crate::recorder::RecorderReader;
use crate::sink::{parse_dsn, MySqlSink};

/// Run a full energy export against the configured recorder and sink
pub async fn export_energy(
    config: &EnergySyncConfig,
    cancel: CancellationToken,
) -> Result<SyncSummary, SyncError> {
    config.validate()?;
    let options = parse_dsn(&config.dsn)?;

    log::info!(
        "⚡ Exporting entities matching '{}' from {}",
        config.entity,
        config.sqlite_path.display()
    );

    let mut reader = RecorderReader::open(&config.sqlite_path)?.with_page_size(config.page_size);

    let mut sink = MySqlSink::connect(options).await?;
    sink.ensure_energy_points_table().await?;
    let watermarks = Watermarks::load(&mut sink).await?;

    let mut sync = EnergySync::new(config.clone(), watermarks, sink, cancel);
    let summary = sync.run(&mut reader).await?;

    sync.into_sink().close().await;
    Ok(summary)
}
