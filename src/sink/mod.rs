//! Relational sink (MySQL / TiDB)
//!
//! Rows reach the sink only as multi-row upserts built by [`BatchWriter`].
//! The backend trait keeps the writer testable without a live server.

pub mod batch;
pub mod dsn;
pub mod mysql;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

pub use batch::{BatchWriter, UpsertTable, UPSERT_BATCH_SIZE};
pub use dsn::{parse_dsn, DsnError};
pub use mysql::MySqlSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("statement rejected: {0}")]
    Rejected(String),
    #[error("write cancelled")]
    Cancelled,
}

/// Positional argument bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    /// DATETIME, always UTC
    DateTime(Option<NaiveDateTime>),
}

/// A serialized multi-row upsert ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertStatement {
    pub sql: String,
    pub args: Vec<SqlValue>,
    pub rows: usize,
}

/// Backend trait for executing upserts
#[async_trait]
pub trait SinkBackend: Send {
    /// Execute one statement, returning affected rows
    async fn execute(&mut self, statement: &UpsertStatement) -> Result<u64, SinkError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
