use alert_logging::{alert_debug, alert_warn};
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::message::DecodedMessage;
use crate::record::{Record, RecordFormat};
use crate::snippet::normalize_snippet;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Elements delimiting one alert entry.
    pub heading_selector: String,
    /// Link carrying the title, searched inside the heading.
    pub title_selector: String,
    /// Direct child of the heading holding the `[PDF]`/`[HTML]` marker.
    pub marker_tag: String,
    /// When false, stop after the first record of a message.
    pub collect_all: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            heading_selector: "h3".to_string(),
            title_selector: "a.gse_alrt_title".to_string(),
            marker_tag: "span".to_string(),
            collect_all: true,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("message {message_id} body is not html: {reason}")]
    ParseFailure { message_id: String, reason: String },
    #[error("invalid selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Why a single heading block produced no record.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("heading has no title link")]
    MissingTitle,
    #[error("title link is empty")]
    EmptyTitle,
    #[error("heading has no bibliographic detail after it")]
    MissingBibliographicDetail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedHeading {
    /// Zero-based index of the heading in document order.
    pub position: usize,
    pub reason: MalformedRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractOutcome {
    pub headings: usize,
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedHeading>,
}

/// Pulls alert records out of a decoded message body.
#[derive(Debug)]
pub struct RecordExtractor {
    options: ExtractOptions,
    heading: Selector,
    title: Selector,
}

impl RecordExtractor {
    pub fn new(options: ExtractOptions) -> Result<Self, ExtractError> {
        let heading = compile_selector(&options.heading_selector)?;
        let title = compile_selector(&options.title_selector)?;
        Ok(Self {
            options,
            heading,
            title,
        })
    }

    /// Extract every usable heading block, in document order.
    ///
    /// Malformed blocks are skipped and reported in the outcome; only a body
    /// without any markup fails the whole message. Headings sharing a title
    /// all yield records; idempotency is left to the sinks.
    pub fn extract(&self, message: &DecodedMessage) -> Result<ExtractOutcome, ExtractError> {
        let document = Html::parse_document(&message.body_text);
        ensure_markup(&document, message)?;

        let mut outcome = ExtractOutcome::default();

        for (position, heading) in document.select(&self.heading).enumerate() {
            outcome.headings += 1;
            match self.extract_heading(heading, message) {
                Ok(record) => {
                    outcome.records.push(record);
                    if !self.options.collect_all {
                        break;
                    }
                }
                Err(reason) => {
                    alert_warn!(
                        "message {} heading {}: skipped, {}",
                        message.id,
                        position,
                        reason
                    );
                    outcome.skipped.push(SkippedHeading { position, reason });
                }
            }
        }

        alert_debug!(
            "message {}: {} headings, {} records, {} skipped",
            message.id,
            outcome.headings,
            outcome.records.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    fn extract_heading(
        &self,
        heading: ElementRef<'_>,
        message: &DecodedMessage,
    ) -> Result<Record, MalformedRecord> {
        let title_link = heading
            .select(&self.title)
            .next()
            .ok_or(MalformedRecord::MissingTitle)?;
        let title = title_link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            return Err(MalformedRecord::EmptyTitle);
        }

        let detail_node =
            next_content_sibling(*heading).ok_or(MalformedRecord::MissingBibliographicDetail)?;
        let bibliographic_detail = node_text(detail_node).trim().to_string();

        let snippet = next_content_sibling(detail_node)
            .map(snippet_text)
            .unwrap_or_default();

        Ok(Record {
            message_id: message.id.clone(),
            label: message.label.clone(),
            sent_date: message.sent_date,
            harvested_date: message.harvested_date,
            format: self.marker_format(heading),
            bibliographic_detail,
            snippet,
            title,
        })
    }

    fn marker_format(&self, heading: ElementRef<'_>) -> RecordFormat {
        heading
            .children()
            .filter_map(ElementRef::wrap)
            .find(|child| {
                child
                    .value()
                    .name()
                    .eq_ignore_ascii_case(&self.options.marker_tag)
            })
            .map(|marker| RecordFormat::from_marker(&marker.text().collect::<String>()))
            .unwrap_or(RecordFormat::Unknown)
    }
}

fn compile_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|err| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        message: err.to_string(),
    })
}

/// html5ever accepts anything, so "not html" means no element beyond the
/// implied `html`/`head`/`body` scaffold.
fn ensure_markup(document: &Html, message: &DecodedMessage) -> Result<(), ExtractError> {
    if message.body_text.trim().is_empty() {
        return Err(ExtractError::ParseFailure {
            message_id: message.id.clone(),
            reason: "body is empty".to_string(),
        });
    }
    let has_markup = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|el| !matches!(el.value().name(), "html" | "head" | "body"));
    if has_markup {
        Ok(())
    } else {
        Err(ExtractError::ParseFailure {
            message_id: message.id.clone(),
            reason: "body contains no markup".to_string(),
        })
    }
}

/// Next sibling carrying content; whitespace-only text and comments are skipped.
fn next_content_sibling(node: NodeRef<'_, Node>) -> Option<NodeRef<'_, Node>> {
    node.next_siblings().find(|sibling| match sibling.value() {
        Node::Element(_) => true,
        Node::Text(text) => !text.trim().is_empty(),
        _ => false,
    })
}

fn node_text(node: NodeRef<'_, Node>) -> String {
    match node.value() {
        Node::Text(text) => text.to_string(),
        _ => ElementRef::wrap(node)
            .map(|el| el.text().collect())
            .unwrap_or_default(),
    }
}

fn snippet_text(node: NodeRef<'_, Node>) -> String {
    let joined = match node.value() {
        Node::Text(text) => text.trim().to_string(),
        _ => ElementRef::wrap(node)
            .map(|el| {
                el.text()
                    .map(str::trim)
                    .filter(|fragment| !fragment.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default(),
    };
    normalize_snippet(&joined)
}
