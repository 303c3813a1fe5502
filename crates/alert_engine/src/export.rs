use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use alert_core::{MessageSummary, Record};
use alert_logging::alert_info;
use serde::{Deserialize, Serialize};

use crate::persist::{ensure_output_dir, AtomicFileWriter, PersistError};
use crate::sink::{RecordSink, SinkError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ExportDocument {
    record_count: usize,
    records: Vec<Record>,
    messages: Vec<MessageSummary>,
}

/// Keeps the harvested records in one JSON document, rewritten atomically on close.
///
/// An existing document is loaded on open, so re-running over the same
/// messages does not duplicate entries.
#[derive(Debug)]
pub struct JsonFileSink {
    writer: AtomicFileWriter,
    document: ExportDocument,
    keys: HashSet<String>,
    closed: bool,
}

impl JsonFileSink {
    pub fn open(dir: &Path, filename: &str) -> Result<Self, SinkError> {
        ensure_output_dir(dir)?;
        let writer = AtomicFileWriter::new(dir, filename);
        let document = match fs::read_to_string(writer.path()) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => ExportDocument::default(),
            Err(err) => return Err(SinkError::Persist(PersistError::Io(err))),
        };
        let keys = document.records.iter().map(Record::natural_key).collect();
        alert_info!(
            "opened export {:?} with {} existing records",
            writer.path(),
            document.records.len()
        );
        Ok(Self {
            writer,
            document,
            keys,
            closed: false,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.writer.path().to_path_buf()
    }

    pub fn records(&self) -> &[Record] {
        &self.document.records
    }
}

impl RecordSink for JsonFileSink {
    fn insert_records(&mut self, records: &[Record]) -> Result<usize, SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        let mut stored = 0;
        for record in records {
            if self.keys.insert(record.natural_key()) {
                self.document.records.push(record.clone());
                stored += 1;
            }
        }
        Ok(stored)
    }

    fn record_message(&mut self, summary: &MessageSummary) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        let messages = &mut self.document.messages;
        match messages
            .iter_mut()
            .find(|m| m.message_id == summary.message_id)
        {
            Some(existing) => *existing = summary.clone(),
            None => messages.push(summary.clone()),
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.document.record_count = self.document.records.len();
        let content = serde_json::to_vec_pretty(&self.document)?;
        self.writer.write(&content)?;
        self.closed = true;
        alert_info!(
            "wrote {} records to {:?}",
            self.document.record_count,
            self.writer.path()
        );
        Ok(())
    }
}
