use alert_core::{decode_message, select_label, DecodeError, DecodeOptions, RawMessage};
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::json;

fn harvested() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn raw_message(labels: &[&str], internal_date: &str, body: &str) -> RawMessage {
    serde_json::from_value(json!({
        "id": "18c0ffee",
        "threadId": "18c0ffee",
        "labelIds": labels,
        "internalDate": internal_date,
        "payload": {
            "mimeType": "text/html",
            "headers": [{ "name": "Content-Type", "value": "text/html; charset=UTF-8" }],
            "body": { "size": body.len(), "data": URL_SAFE_NO_PAD.encode(body) }
        }
    }))
    .unwrap()
}

#[test]
fn base64url_body_round_trips_exactly() {
    alert_logging::initialize_for_tests();
    let original = "<p>Grüße — naïve café ✓ ?&/+</p>";
    let raw = raw_message(&["UNREAD"], "1590969600000", original);

    let decoded = decode_message(&raw, harvested(), &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.body_text, original);
}

#[test]
fn padded_base64url_is_accepted() {
    let mut raw = raw_message(&[], "0", "x");
    raw.payload.body.data = Some(URL_SAFE.encode("ab"));
    assert!(raw.payload.body.data.as_deref().unwrap().ends_with('='));

    let decoded = decode_message(&raw, harvested(), &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.body_text, "ab");
}

#[test]
fn decode_is_deterministic_for_fixed_clock() {
    let raw = raw_message(&["UNREAD", "Label_123"], "1590969600000", "<h3>x</h3>");
    let options = DecodeOptions::default();

    let first = decode_message(&raw, harvested(), &options).unwrap();
    let second = decode_message(&raw, harvested(), &options).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.id, "18c0ffee");
    assert_eq!(first.harvested_date, harvested());
    // 2020-06-01T00:00:00Z
    assert_eq!(first.sent_date, NaiveDate::from_ymd_opt(2020, 6, 1).unwrap());
    assert_eq!(first.label.as_deref(), Some("Label_123"));
}

#[test]
fn sent_date_follows_configured_offset() {
    // 2020-05-31T23:30:00Z
    let raw = raw_message(&[], "1590967800000", "<p/>");
    let utc = decode_message(&raw, harvested(), &DecodeOptions::default()).unwrap();
    assert_eq!(utc.sent_date, NaiveDate::from_ymd_opt(2020, 5, 31).unwrap());

    let options = DecodeOptions {
        utc_offset_minutes: 60,
        ..DecodeOptions::default()
    };
    let shifted = decode_message(&raw, harvested(), &options).unwrap();
    assert_eq!(shifted.sent_date, NaiveDate::from_ymd_opt(2020, 6, 1).unwrap());
}

#[test]
fn internal_date_accepts_json_number() {
    let raw: RawMessage = serde_json::from_value(json!({
        "id": "n",
        "internalDate": 86_400_000i64,
        "payload": { "body": { "data": URL_SAFE_NO_PAD.encode("<b>hi</b>") } }
    }))
    .unwrap();
    assert!(raw.label_ids.is_empty());

    let decoded = decode_message(&raw, harvested(), &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.sent_date, NaiveDate::from_ymd_opt(1970, 1, 2).unwrap());
    assert_eq!(decoded.label, None);
}

#[test]
fn missing_body_is_an_error_not_an_empty_string() {
    let mut raw = raw_message(&[], "0", "x");
    raw.payload.body.data = None;

    let err = decode_message(&raw, harvested(), &DecodeOptions::default()).unwrap_err();
    assert_eq!(
        err,
        DecodeError::MissingBody {
            id: "18c0ffee".into()
        }
    );
}

#[test]
fn invalid_base64_is_rejected() {
    let mut raw = raw_message(&[], "0", "x");
    raw.payload.body.data = Some("not*base64!".into());

    let err = decode_message(&raw, harvested(), &DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidBase64 { .. }), "{err:?}");
}

#[test]
fn invalid_utf8_is_rejected_without_replacement() {
    let mut raw = raw_message(&[], "0", "x");
    raw.payload.body.data = Some(URL_SAFE_NO_PAD.encode([0x66u8, 0x6f, 0xff, 0x6f]));

    let err = decode_message(&raw, harvested(), &DecodeOptions::default()).unwrap_err();
    assert_eq!(
        err,
        DecodeError::InvalidText {
            id: "18c0ffee".into(),
            encoding: "UTF-8".into()
        }
    );
}

#[test]
fn declared_charset_is_honoured() {
    let raw: RawMessage = serde_json::from_value(json!({
        "id": "latin",
        "internalDate": "0",
        "payload": {
            "mimeType": "text/html",
            "headers": [{ "name": "content-type", "value": "text/html; charset=\"windows-1252\"" }],
            "body": { "data": URL_SAFE_NO_PAD.encode(b"caf\xe9") }
        }
    }))
    .unwrap();

    let decoded = decode_message(&raw, harvested(), &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.body_text, "café");
}

#[test]
fn unknown_charset_is_reported() {
    let raw: RawMessage = serde_json::from_value(json!({
        "id": "odd",
        "internalDate": "0",
        "payload": {
            "headers": [{ "name": "Content-Type", "value": "text/html; charset=x-klingon" }],
            "body": { "data": URL_SAFE_NO_PAD.encode("hi") }
        }
    }))
    .unwrap();

    let err = decode_message(&raw, harvested(), &DecodeOptions::default()).unwrap_err();
    assert_eq!(
        err,
        DecodeError::UnknownCharset {
            id: "odd".into(),
            charset: "x-klingon".into()
        }
    );
}

#[test]
fn multipart_message_prefers_html_part() {
    let raw: RawMessage = serde_json::from_value(json!({
        "id": "multi",
        "internalDate": "0",
        "payload": {
            "mimeType": "multipart/alternative",
            "body": { "size": 0 },
            "parts": [
                { "mimeType": "text/plain", "body": { "data": URL_SAFE_NO_PAD.encode("plain") } },
                { "mimeType": "multipart/related", "parts": [
                    { "mimeType": "text/html", "body": { "data": URL_SAFE_NO_PAD.encode("<h3>html</h3>") } }
                ]}
            ]
        }
    }))
    .unwrap();

    let decoded = decode_message(&raw, harvested(), &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.body_text, "<h3>html</h3>");
}

#[test]
fn out_of_range_offset_is_rejected() {
    let raw = raw_message(&[], "0", "x");
    let options = DecodeOptions {
        utc_offset_minutes: 24 * 60,
        ..DecodeOptions::default()
    };
    let err = decode_message(&raw, harvested(), &options).unwrap_err();
    assert_eq!(err, DecodeError::InvalidUtcOffset(1440));
}

#[test]
fn label_selection_is_stable_regardless_of_input_order() {
    let forward: Vec<String> = ["UNREAD", "Label_9", "INBOX", "Label_10"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut reversed = forward.clone();
    reversed.reverse();

    assert_eq!(select_label(&forward, "Label").as_deref(), Some("Label_10"));
    assert_eq!(select_label(&reversed, "Label").as_deref(), Some("Label_10"));
}

#[test]
fn label_is_none_without_custom_labels() {
    let labels = vec!["UNREAD".to_string(), "CATEGORY_UPDATES".to_string()];
    assert_eq!(select_label(&labels, "Label"), None);
    assert_eq!(
        select_label(&labels, "CATEGORY").as_deref(),
        Some("CATEGORY_UPDATES")
    );
}
