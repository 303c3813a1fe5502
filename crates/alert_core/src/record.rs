use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Full-text availability indicator shown in front of an alert title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecordFormat {
    #[serde(rename = "PDF")]
    Pdf,
    #[serde(rename = "HTML")]
    Html,
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl RecordFormat {
    /// Interpret the text of a marker element such as `[PDF]` or `HTML`.
    pub fn from_marker(text: &str) -> Self {
        let cleaned = text.trim().trim_matches(['[', ']']).trim();
        if cleaned.eq_ignore_ascii_case("PDF") {
            RecordFormat::Pdf
        } else if cleaned.eq_ignore_ascii_case("HTML") {
            RecordFormat::Html
        } else {
            RecordFormat::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordFormat::Pdf => "PDF",
            RecordFormat::Html => "HTML",
            RecordFormat::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One citation extracted from an alert message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub message_id: String,
    pub label: Option<String>,
    pub sent_date: NaiveDate,
    pub harvested_date: NaiveDate,
    pub format: RecordFormat,
    pub bibliographic_detail: String,
    pub snippet: String,
    pub title: String,
}

impl Record {
    /// Stable identity across runs: short SHA-256 of `(label, title, sent_date)`.
    pub fn natural_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.label.as_deref().unwrap_or("").as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.title.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.sent_date.to_string().as_bytes());
        let digest = hasher.finalize();
        digest[..8].iter().map(|byte| format!("{byte:02x}")).collect()
    }
}
