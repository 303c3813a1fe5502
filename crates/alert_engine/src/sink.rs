use std::collections::HashSet;

use alert_core::{MessageSummary, Record};
use thiserror::Error;

use crate::persist::PersistError;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("sink is closed")]
    Closed,
}

/// Destination for extracted records.
///
/// Sinks are opened by their constructor and must be closed explicitly once
/// the batch is done. Inserts are idempotent on [`Record::natural_key`].
pub trait RecordSink {
    /// Store `records`, returning how many were new.
    fn insert_records(&mut self, records: &[Record]) -> Result<usize, SinkError>;

    fn record_message(&mut self, _summary: &MessageSummary) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps everything in memory; used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    records: Vec<Record>,
    messages: Vec<MessageSummary>,
    keys: HashSet<String>,
    closed: bool,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn messages(&self) -> &[MessageSummary] {
        &self.messages
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RecordSink for MemoryRecordSink {
    fn insert_records(&mut self, records: &[Record]) -> Result<usize, SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        let mut stored = 0;
        for record in records {
            if self.keys.insert(record.natural_key()) {
                self.records.push(record.clone());
                stored += 1;
            }
        }
        Ok(stored)
    }

    fn record_message(&mut self, summary: &MessageSummary) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.messages.retain(|m| m.message_id != summary.message_id);
        self.messages.push(summary.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        Ok(())
    }
}
