use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// A message as returned by the mailbox API with `format=full`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    /// Epoch milliseconds. The API encodes this as a JSON string.
    #[serde(deserialize_with = "epoch_millis")]
    pub internal_date: i64,
    #[serde(default)]
    pub payload: MessagePart,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: MessageBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub size: u64,
    /// base64url encoded content.
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl MessagePart {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Charset declared by the part's `Content-Type` header, if any.
    pub fn charset(&self) -> Option<String> {
        self.header("Content-Type").and_then(extract_charset)
    }

    pub(crate) fn has_body_data(&self) -> bool {
        self.body
            .data
            .as_deref()
            .is_some_and(|data| !data.trim().is_empty())
    }
}

/// Intermediate form handed from the decoder to the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedMessage {
    pub id: String,
    pub harvested_date: NaiveDate,
    pub sent_date: NaiveDate,
    pub label: Option<String>,
    pub body_text: String,
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("charset") {
                Some(value.trim_matches([' ', '"', '\''].as_ref()))
            } else {
                None
            }
        })
        .find(|value| !value.is_empty())
        .map(|s| s.to_string())
}

fn epoch_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Number(i64),
        Text(String),
    }

    match Millis::deserialize(deserializer)? {
        Millis::Number(value) => Ok(value),
        Millis::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
