use thiserror::Error;

use crate::attributes::AttributeError;
use crate::config::ConfigError;
use crate::recorder::TimestampError;
use crate::sink::{DsnError, SinkError};

/// Fatal error for an export run
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("recorder database: {0}")]
    Source(#[from] rusqlite::Error),

    #[error("sink: {0}")]
    Sink(SinkError),

    #[error("parse mysql dsn: {0}")]
    Dsn(#[from] DsnError),

    #[error("parse attributes for state_id {state_id}: {source}")]
    Attributes {
        state_id: i64,
        #[source]
        source: AttributeError,
    },

    #[error("convert last_updated_ts for state_id {state_id}: {source}")]
    Timestamp {
        state_id: i64,
        #[source]
        source: TimestampError,
    },

    #[error("export cancelled")]
    Cancelled,
}

impl From<SinkError> for SyncError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Cancelled => SyncError::Cancelled,
            other => SyncError::Sink(other),
        }
    }
}
