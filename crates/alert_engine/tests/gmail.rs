use std::time::Duration;

use alert_engine::{FailureKind, GmailClient, GmailSettings, MailboxClient};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MESSAGES: &str = "/gmail/v1/users/me/messages";

fn client(server: &MockServer) -> GmailClient {
    let settings = GmailSettings {
        base_url: server.uri(),
        max_retries: 1,
        retry_backoff: Duration::from_millis(5),
        ..GmailSettings::default()
    };
    GmailClient::new(settings, "test-token").unwrap()
}

#[tokio::test]
async fn listing_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .and(query_param("q", "is:unread"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "m3", "threadId": "t3" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .and(query_param_is_missing("pageToken"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "m1", "threadId": "t1" }, { "id": "m2", "threadId": "t2" }],
            "nextPageToken": "p2",
            "resultSizeEstimate": 3
        })))
        .mount(&server)
        .await;

    let ids = client(&server).list_unread_message_ids().await.unwrap();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn empty_mailbox_lists_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resultSizeEstimate": 0 })))
        .mount(&server)
        .await;

    let ids = client(&server).list_unread_message_ids().await.unwrap();
    assert!(ids.is_empty());
}

#[tokio::test]
async fn repeated_page_token_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "m1" }],
            "nextPageToken": "same"
        })))
        .mount(&server)
        .await;

    let err = client(&server).list_unread_message_ids().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidResponse);
}

#[tokio::test]
async fn fetch_requests_full_format_and_parses_payload() {
    let server = MockServer::start().await;
    let body = URL_SAFE_NO_PAD.encode("<h3><a class=\"gse_alrt_title\">T</a></h3>");
    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/abc")))
        .and(query_param("format", "full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc",
            "threadId": "abc",
            "labelIds": ["UNREAD", "Label_7"],
            "internalDate": "1590969600000",
            "payload": {
                "mimeType": "text/html",
                "headers": [{ "name": "Content-Type", "value": "text/html; charset=UTF-8" }],
                "body": { "size": 41, "data": body }
            }
        })))
        .mount(&server)
        .await;

    let message = client(&server).fetch_message("abc").await.unwrap();
    assert_eq!(message.id, "abc");
    assert_eq!(message.internal_date, 1_590_969_600_000);
    assert_eq!(message.label_ids, vec!["UNREAD", "Label_7"]);
    assert_eq!(message.payload.mime_type, "text/html");
}

#[tokio::test]
async fn missing_message_maps_to_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/gone")))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).fetch_message("gone").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert!(!err.is_retryable());
    assert_eq!(err.message, "not found");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "m1" }]
        })))
        .mount(&server)
        .await;

    let ids = client(&server).list_unread_message_ids().await.unwrap();
    assert_eq!(ids, vec!["m1"]);
}

#[tokio::test]
async fn retries_give_up_after_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(MESSAGES))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let err = client(&server).list_unread_message_ids().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(500));
}

#[tokio::test]
async fn malformed_json_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{MESSAGES}/x")))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = client(&server).fetch_message("x").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidResponse);
}

#[tokio::test]
async fn invalid_base_url_is_reported() {
    let settings = GmailSettings {
        base_url: "not a url".to_string(),
        ..GmailSettings::default()
    };
    let client = GmailClient::new(settings, "t").unwrap();
    let err = client.fetch_message("x").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
