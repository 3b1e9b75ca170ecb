//! Home Assistant recorder (source side)
//!
//! ```text
//! home-assistant_v2.db → RecorderReader (keyset pages) → RecorderRow
//!                                                          ↓
//!                                   epoch_to_datetime / shared_attrs decode
//! ```

pub mod reader;
pub mod timestamp;

pub use reader::{CoordinateScan, EntityScan, RecorderReader, RecorderRow, DEFAULT_PAGE_SIZE};
pub use timestamp::{epoch_to_datetime, minute_bucket, TimestampError};
