use alert_logging::alert_debug;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use encoding_rs::{Encoding, UTF_8};
use serde::Deserialize;

use crate::message::{DecodedMessage, MessagePart, RawMessage};

/// URL-safe alphabet; the API omits padding on some payloads and keeps it on others.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Labels starting with this prefix are user-created alert folders.
    pub label_prefix: String,
    /// Offset applied to `internalDate` before taking the calendar date.
    pub utc_offset_minutes: i32,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            label_prefix: "Label".to_string(),
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message {id} has no body data")]
    MissingBody { id: String },
    #[error("message {id} body is not valid base64url: {message}")]
    InvalidBase64 { id: String, message: String },
    #[error("message {id} body is not valid {encoding} text")]
    InvalidText { id: String, encoding: String },
    #[error("message {id} declares unknown charset {charset}")]
    UnknownCharset { id: String, charset: String },
    #[error("message {id} has out-of-range internal date {millis}")]
    InvalidTimestamp { id: String, millis: i64 },
    #[error("utc offset of {0} minutes is out of range")]
    InvalidUtcOffset(i32),
}

/// Turn an API payload into a [`DecodedMessage`].
///
/// Pure: the result depends only on `raw`, `harvested_date` and `options`.
pub fn decode_message(
    raw: &RawMessage,
    harvested_date: NaiveDate,
    options: &DecodeOptions,
) -> Result<DecodedMessage, DecodeError> {
    let sent_date = sent_date(raw, options.utc_offset_minutes)?;

    let part = select_body_part(&raw.payload).ok_or_else(|| DecodeError::MissingBody {
        id: raw.id.clone(),
    })?;
    let body_text = decode_part(&raw.id, part)?;
    let label = select_label(&raw.label_ids, &options.label_prefix);

    alert_debug!(
        "decoded message {} sent={} label={:?} body_len={}",
        raw.id,
        sent_date,
        label,
        body_text.len()
    );

    Ok(DecodedMessage {
        id: raw.id.clone(),
        harvested_date,
        sent_date,
        label,
        body_text,
    })
}

/// First label (in lexicographic order) starting with `prefix`.
///
/// The API gives no ordering guarantee for label ids, so they are sorted
/// before scanning to keep the choice reproducible.
pub fn select_label(label_ids: &[String], prefix: &str) -> Option<String> {
    let mut sorted: Vec<&String> = label_ids.iter().collect();
    sorted.sort();
    sorted
        .into_iter()
        .find(|label| label.starts_with(prefix))
        .cloned()
}

fn sent_date(raw: &RawMessage, utc_offset_minutes: i32) -> Result<NaiveDate, DecodeError> {
    let offset = utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(DecodeError::InvalidUtcOffset(utc_offset_minutes))?;
    let instant = DateTime::<Utc>::from_timestamp_millis(raw.internal_date).ok_or_else(|| {
        DecodeError::InvalidTimestamp {
            id: raw.id.clone(),
            millis: raw.internal_date,
        }
    })?;
    Ok(instant.with_timezone(&offset).date_naive())
}

/// Top-level body first, then the first html part, then the first plain part.
fn select_body_part(payload: &MessagePart) -> Option<&MessagePart> {
    if payload.has_body_data() {
        return Some(payload);
    }
    find_part(payload, "text/html").or_else(|| find_part(payload, "text/plain"))
}

fn find_part<'a>(part: &'a MessagePart, mime_type: &str) -> Option<&'a MessagePart> {
    part.parts.iter().find_map(|child| {
        if child.mime_type.eq_ignore_ascii_case(mime_type) && child.has_body_data() {
            Some(child)
        } else {
            find_part(child, mime_type)
        }
    })
}

fn decode_part(id: &str, part: &MessagePart) -> Result<String, DecodeError> {
    let data = part.body.data.as_deref().unwrap_or_default();
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64URL
        .decode(compact.as_bytes())
        .map_err(|err| DecodeError::InvalidBase64 {
            id: id.to_string(),
            message: err.to_string(),
        })?;

    let encoding = match part.charset() {
        Some(label) => {
            Encoding::for_label(label.as_bytes()).ok_or_else(|| DecodeError::UnknownCharset {
                id: id.to_string(),
                charset: label,
            })?
        }
        None => UTF_8,
    };

    let text = encoding
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .ok_or_else(|| DecodeError::InvalidText {
            id: id.to_string(),
            encoding: encoding.name().to_string(),
        })?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}
