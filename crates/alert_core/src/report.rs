use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-message row stored next to the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub message_id: String,
    pub harvested_date: NaiveDate,
    pub sent_date: NaiveDate,
    pub label: Option<String>,
    pub record_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    Fetch,
    Decode,
    Extract,
    Store,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Fetch => write!(f, "fetch"),
            FailureStage::Decode => write!(f, "decode"),
            FailureStage::Extract => write!(f, "extract"),
            FailureStage::Store => write!(f, "store"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageFailure {
    pub message_id: String,
    pub stage: FailureStage,
    pub reason: String,
}

/// Counters for one harvest run.
///
/// `records_extracted` counts every titled heading. Of those, the ones a sink
/// took are `records_stored` and the ones it already held (same natural key)
/// are `records_duplicate`. Both are only counted once the message is fully
/// stored, so a message failing at the store stage adds to neither.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BatchReport {
    pub messages_listed: usize,
    pub messages_processed: usize,
    pub messages_failed: usize,
    pub records_extracted: usize,
    pub records_skipped: usize,
    pub records_duplicate: usize,
    pub records_stored: usize,
    pub failures: Vec<MessageFailure>,
}

impl BatchReport {
    pub fn record_failure(
        &mut self,
        message_id: impl Into<String>,
        stage: FailureStage,
        reason: impl fmt::Display,
    ) {
        self.messages_failed += 1;
        self.failures.push(MessageFailure {
            message_id: message_id.into(),
            stage,
            reason: reason.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.messages_failed == 0 && self.records_skipped == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "messages: {} listed, {} processed, {} failed; records: {} extracted, {} skipped, {} duplicate, {} stored",
            self.messages_listed,
            self.messages_processed,
            self.messages_failed,
            self.records_extracted,
            self.records_skipped,
            self.records_duplicate,
            self.records_stored
        )
    }
}
