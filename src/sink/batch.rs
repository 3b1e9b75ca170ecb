//! Multi-row upsert batching
//!
//! Rows are buffered as positional arguments plus one `(?, ?, ...)` fragment
//! each. Once [`UPSERT_BATCH_SIZE`] rows are pending, a single
//! `INSERT ... ON DUPLICATE KEY UPDATE` statement is executed and the buffer
//! is cleared. Only one statement is ever in flight.
//!
//! Failed statements are not retried. Every statement overwrites rows keyed
//! on stable identity, so re-running a failed export re-applies identical
//! values.

use super::{SinkBackend, SinkError, SqlValue, UpsertStatement};
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

pub const UPSERT_BATCH_SIZE: usize = 500;

/// Column layout and argument binding for one sink table
pub trait UpsertTable {
    type Row;

    const TABLE: &'static str;

    /// Insert column order; `bind` must push values in this order
    const COLUMNS: &'static [&'static str];

    /// Columns overwritten when the conflict key already exists
    const UPDATE_COLUMNS: &'static [&'static str];

    fn bind(row: &Self::Row, args: &mut Vec<SqlValue>);
}

pub struct BatchWriter<T: UpsertTable, S: SinkBackend> {
    sink: S,
    cancel: CancellationToken,
    batch_size: usize,
    placeholder: String,
    values: String,
    args: Vec<SqlValue>,
    pending: usize,
    rows_written: usize,
    statements_executed: usize,
    _table: PhantomData<fn(&T::Row)>,
}

impl<T: UpsertTable, S: SinkBackend> BatchWriter<T, S> {
    pub fn new(sink: S, cancel: CancellationToken) -> Self {
        let placeholder = format!("({})", vec!["?"; T::COLUMNS.len()].join(", "));

        Self {
            sink,
            cancel,
            batch_size: UPSERT_BATCH_SIZE,
            placeholder,
            values: String::with_capacity(256),
            args: Vec::with_capacity(UPSERT_BATCH_SIZE * T::COLUMNS.len()),
            pending: 0,
            rows_written: 0,
            statements_executed: 0,
            _table: PhantomData,
        }
    }

    /// Buffer one row, executing a statement when the batch is full
    pub async fn append(&mut self, row: &T::Row) -> Result<(), SinkError> {
        if self.pending > 0 {
            self.values.push(',');
        }
        self.values.push_str("\n    ");
        self.values.push_str(&self.placeholder);
        T::bind(row, &mut self.args);
        self.pending += 1;

        if self.pending >= self.batch_size {
            return self.flush().await;
        }
        Ok(())
    }

    /// Execute whatever is buffered; no-op when empty
    pub async fn flush(&mut self) -> Result<(), SinkError> {
        if self.pending == 0 {
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            return Err(SinkError::Cancelled);
        }

        let statement = self.build_statement();
        let affected = self.sink.execute(&statement).await?;

        log::debug!(
            "✅ Upserted {} rows into {} via {} ({} affected)",
            statement.rows,
            T::TABLE,
            self.sink.backend_type(),
            affected
        );

        self.rows_written += self.pending;
        self.statements_executed += 1;
        self.values.clear();
        self.args.clear();
        self.pending = 0;
        Ok(())
    }

    fn build_statement(&self) -> UpsertStatement {
        let updates = T::UPDATE_COLUMNS
            .iter()
            .map(|col| format!("    {col} = VALUES({col})"))
            .collect::<Vec<_>>()
            .join(",\n");

        let mut sql = String::with_capacity(self.values.len() + updates.len() + 128);
        sql.push_str("INSERT INTO ");
        sql.push_str(T::TABLE);
        sql.push_str("(\n    ");
        sql.push_str(&T::COLUMNS.join(",\n    "));
        sql.push_str("\n) VALUES");
        sql.push_str(&self.values);
        sql.push_str("\nON DUPLICATE KEY UPDATE\n");
        sql.push_str(&updates);

        UpsertStatement {
            sql,
            args: self.args.clone(),
            rows: self.pending,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn statements_executed(&self) -> usize {
        self.statements_executed
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
