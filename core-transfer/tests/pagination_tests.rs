//! Listing through `CloudClient` against a scripted server

mod common;

use common::{json_response, JsonAdapter, ScriptedHttpClient, Step};
use core_transfer::{CloudClient, ErrorKind, TransferError};
use serde_json::json;
use std::sync::Arc;

fn client(steps: Vec<Step>) -> (Arc<ScriptedHttpClient>, CloudClient<JsonAdapter>) {
    let http = Arc::new(ScriptedHttpClient::new(steps));
    let client = CloudClient::new(http.clone(), JsonAdapter);
    (http, client)
}

fn page(ids: &[&str], next: Option<&str>) -> Step {
    let items: Vec<_> = ids.iter().map(|id| json!({ "id": id, "name": id })).collect();
    json_response(200, json!({ "items": items, "next": next }))
}

#[tokio::test]
async fn test_three_pages_concatenated_in_order() {
    let (http, client) = client(vec![
        page(&["1", "2"], Some("A")),
        page(&["3", "4"], Some("B")),
        page(&["5"], None),
    ]);

    let files = client.list_all("/Music").await.unwrap();

    let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

    let urls: Vec<_> = http.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://api.test/list/Music",
            "https://api.test/list/Music?token=A",
            "https://api.test/list/Music?token=B",
        ]
    );
}

#[tokio::test]
async fn test_single_empty_page() {
    let (http, client) = client(vec![page(&[], None)]);

    let files = client.list_all("/").await.unwrap();

    assert!(files.is_empty());
    assert_eq!(http.request_count(), 1);
}

#[tokio::test]
async fn test_repeated_token_is_protocol_error() {
    let (http, client) = client(vec![
        page(&["1"], Some("A")),
        page(&["2"], Some("A")),
        page(&["never"], None),
    ]);

    let result = client.list_all_partial("/").await;

    assert_eq!(result.items.len(), 2);
    assert_eq!(
        result.error.as_ref().map(TransferError::kind),
        Some(ErrorKind::PaginationProtocolError)
    );
    assert_eq!(http.request_count(), 2);
}

#[tokio::test]
async fn test_error_status_goes_through_mapper_and_keeps_partial_items() {
    let (_http, client) = client(vec![
        page(&["1", "2"], Some("A")),
        Step::Respond(bridge_traits::http::HttpResponse::new(503, "unavailable")),
    ]);

    let result = client.list_all_partial("/Docs").await;

    assert_eq!(result.items.len(), 2);
    match result.error {
        Some(TransferError::ProviderReported {
            status_code,
            message,
            path,
        }) => {
            assert_eq!(status_code, 503);
            assert_eq!(message, "unavailable");
            assert_eq!(path, "/Docs");
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_list_all_discards_partial_items_on_error() {
    let (http, client) = client(vec![
        page(&["1"], Some("A")),
        Step::Fail("connection reset".to_string()),
    ]);

    let err = client.list_all("/").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert_eq!(http.request_count(), 2);
    assert_eq!(http.replayable_sends(), 0);
}

#[tokio::test]
async fn test_unparseable_page_reports_url() {
    let (_http, client) = client(vec![
        page(&["1"], Some("A")),
        Step::Respond(bridge_traits::http::HttpResponse::new(200, "<html>")),
    ]);

    let result = client.list_all_partial("/x").await;

    match result.error {
        Some(TransferError::BadServerResponse { url, range, .. }) => {
            assert_eq!(url, "https://api.test/list/x?token=A");
            assert!(range.is_none());
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(result.items.len(), 1);
}
