use std::sync::Arc;

use alert_core::{
    decode_message, BatchReport, DecodeOptions, DecodedMessage, ExtractError, ExtractOptions,
    FailureStage, MessageSummary, RecordExtractor,
};
use alert_logging::{alert_info, alert_warn};
use chrono::{Local, NaiveDate};

use crate::mailbox::MailboxClient;
use crate::sink::RecordSink;
use crate::{HarvestEvent, ProgressSink, TransportError};

/// Source of the harvest date, read once per batch.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("listing unread messages failed: {0}")]
    Listing(#[source] TransportError),
}

/// Runs one batch: list unread alerts, then fetch, decode, extract and store each.
pub struct Harvester {
    decode_options: DecodeOptions,
    extractor: RecordExtractor,
    today: Clock,
}

impl Harvester {
    pub fn new(
        decode_options: DecodeOptions,
        extract_options: ExtractOptions,
    ) -> Result<Self, ExtractError> {
        Self::with_clock(
            decode_options,
            extract_options,
            Arc::new(|| Local::now().date_naive()),
        )
    }

    pub fn with_clock(
        decode_options: DecodeOptions,
        extract_options: ExtractOptions,
        today: Clock,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            decode_options,
            extractor: RecordExtractor::new(extract_options)?,
            today,
        })
    }

    /// Process every unread message in listing order.
    ///
    /// Only a failed listing aborts the batch. A message that fails at any
    /// stage is recorded in the report and the batch moves on.
    pub async fn run(
        &self,
        mailbox: &dyn MailboxClient,
        sink: &mut dyn RecordSink,
        progress: &dyn ProgressSink,
    ) -> Result<BatchReport, HarvestError> {
        let harvested_date = (self.today)();
        let ids = mailbox
            .list_unread_message_ids()
            .await
            .map_err(HarvestError::Listing)?;

        let mut report = BatchReport {
            messages_listed: ids.len(),
            ..BatchReport::default()
        };
        alert_info!("harvest {}: {} unread messages", harvested_date, ids.len());
        progress.emit(HarvestEvent::Listed { count: ids.len() });

        for id in &ids {
            match self
                .process_message(mailbox, sink, id, harvested_date, &mut report)
                .await
            {
                Ok(event) => {
                    report.messages_processed += 1;
                    progress.emit(event);
                }
                Err((stage, reason)) => {
                    alert_warn!("message {} failed at {}: {}", id, stage, reason);
                    report.record_failure(id.as_str(), stage, &reason);
                    progress.emit(HarvestEvent::MessageFailed {
                        message_id: id.clone(),
                        stage,
                    });
                }
            }
        }

        alert_info!("harvest {} done: {}", harvested_date, report);
        Ok(report)
    }

    async fn process_message(
        &self,
        mailbox: &dyn MailboxClient,
        sink: &mut dyn RecordSink,
        id: &str,
        harvested_date: NaiveDate,
        report: &mut BatchReport,
    ) -> Result<HarvestEvent, (FailureStage, String)> {
        let raw = mailbox
            .fetch_message(id)
            .await
            .map_err(|err| (FailureStage::Fetch, err.to_string()))?;
        let decoded = decode_message(&raw, harvested_date, &self.decode_options)
            .map_err(|err| (FailureStage::Decode, err.to_string()))?;
        let outcome = self
            .extractor
            .extract(&decoded)
            .map_err(|err| (FailureStage::Extract, err.to_string()))?;

        report.records_extracted += outcome.records.len();
        report.records_skipped += outcome.skipped.len();

        let stored = sink
            .insert_records(&outcome.records)
            .map_err(|err| (FailureStage::Store, err.to_string()))?;
        sink.record_message(&summary(&decoded, outcome.records.len()))
            .map_err(|err| (FailureStage::Store, err.to_string()))?;
        report.records_stored += stored;
        report.records_duplicate += outcome.records.len().saturating_sub(stored);

        Ok(HarvestEvent::MessageCompleted {
            message_id: id.to_string(),
            records: outcome.records.len(),
            skipped: outcome.skipped.len(),
            stored,
        })
    }
}

fn summary(message: &DecodedMessage, record_count: usize) -> MessageSummary {
    MessageSummary {
        message_id: message.id.clone(),
        harvested_date: message.harvested_date,
        sent_date: message.sent_date,
        label: message.label.clone(),
        record_count,
    }
}
