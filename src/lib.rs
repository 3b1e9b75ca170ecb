//! Home Assistant recorder export
//!
//! Incrementally copies telemetry out of the Home Assistant SQLite recorder
//! into MySQL / TiDB:
//!
//! - [`energy`]: smart socket sensors into `energy_points`, with per-entity
//!   watermarks and per-minute averaging of voltage/current signals
//! - [`gps`]: device tracker coordinates into `gps_points`
//!
//! Both exports are batch catch-up jobs. Writes are idempotent upserts, so a
//! failed run can simply be repeated.

pub mod attributes;
pub mod config;
pub mod energy;
pub mod error;
pub mod gps;
pub mod recorder;
pub mod sink;

pub use config::{ConfigError, EnergySyncConfig, GpsSyncConfig};
pub use energy::{export_energy, EnergySync, SyncSummary};
pub use error::SyncError;
pub use gps::{export_gps, GpsSummary, GpsSync};
