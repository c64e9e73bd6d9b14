use super::handler::{handle_request, ServerState};
use crate::request::{JournalMode, RequestSpecification};
use crate::response::ResponseDefinition;
use crate::stub::{respond_with, Stub, StubConfiguration};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use std::sync::Arc;
use tracing_test::traced_test;

fn state(verbose: bool, mode: JournalMode) -> Arc<ServerState> {
    Arc::new(ServerState::new(verbose, mode))
}

fn get(uri: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn add_ping(state: &ServerState, name: &str) {
    let stub = Stub::new(
        StubConfiguration::named(name),
        RequestSpecification::text()
            .method(Method::GET)
            .path("/ping")
            .build(),
        respond_with(|_| ResponseDefinition::text("Pong")),
    );
    state.registry().add(Arc::new(stub)).unwrap();
}

async fn body_string(response: hyper::Response<crate::response::ResponseBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_matched_request_served_and_counted() {
    let state = state(false, JournalMode::Lean);
    add_ping(&state, "ping");

    let response = handle_request(get("/ping"), Arc::clone(&state)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "Pong");

    let stubs = state.registry().get_all();
    assert_eq!(stubs[0].match_count(), 1);
    assert!(state.journal().unmatched().is_empty());
    // lean mode keeps no matched entries
    assert!(state.journal().matched().is_empty());
}

#[tokio::test]
async fn test_full_journal_records_matched() {
    let state = state(false, JournalMode::Full);
    add_ping(&state, "ping");

    handle_request(get("/ping?x=1"), Arc::clone(&state)).await.unwrap();

    let matched = state.journal().matched();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].method, "GET");
    assert_eq!(matched[0].uri, "/ping?x=1");
}

#[tokio::test]
#[traced_test]
async fn test_unmatched_request_returns_404() {
    let state = state(false, JournalMode::Lean);
    add_ping(&state, "ping");

    let response = handle_request(get("/missing"), Arc::clone(&state)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        body_string(response).await,
        "No matched mapping for request: GET /missing"
    );

    let unmatched = state.journal().unmatched();
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].to_string(), "GET /missing");
    assert!(logs_contain("No matched mapping for request: GET /missing"));
}

#[tokio::test]
#[traced_test]
async fn test_verbose_404_lists_stubs() {
    let state = state(true, JournalMode::Lean);
    add_ping(&state, "first");
    add_ping(&state, "second");

    let response = handle_request(get("/nope"), Arc::clone(&state)).await.unwrap();
    let body = body_string(response).await;
    assert!(body.starts_with("No matched mapping for request: GET /nope\n\nAvailable stubs:\n"));
    assert!(body.contains("Stub('first')"));
    assert!(body.contains("\n---\nStub('second')"));
    assert!(logs_contain("No stubs found for the request: GET /nope. Available stubs: 2"));
}

#[tokio::test]
#[traced_test]
async fn test_stub_verbose_logs_match() {
    let state = state(false, JournalMode::Lean);
    let stub = Stub::new(
        StubConfiguration::named("loud").verbose(true),
        RequestSpecification::text().path("/loud").build(),
        respond_with(|_| ResponseDefinition::text("ok")),
    );
    state.registry().add(Arc::new(stub)).unwrap();

    let response = handle_request(get("/loud"), Arc::clone(&state)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(logs_contain("Request matched: GET /loud by Stub('loud')"));
}

#[tokio::test]
async fn test_remove_after_match_then_404() {
    let state = state(false, JournalMode::Lean);
    let stub = Stub::new(
        StubConfiguration::named("once").remove_after_match(true),
        RequestSpecification::text().path("/once").build(),
        respond_with(|_| ResponseDefinition::text("only once")),
    );
    state.registry().add(Arc::new(stub)).unwrap();

    let first = handle_request(get("/once"), Arc::clone(&state)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = handle_request(get("/once"), Arc::clone(&state)).await.unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
    assert!(state.registry().is_empty());
}

#[tokio::test]
async fn test_json_body_matching() {
    #[derive(serde::Deserialize)]
    struct Order {
        qty: u32,
    }

    let state = state(false, JournalMode::Lean);
    let stub = Stub::new(
        StubConfiguration::named("big-order"),
        RequestSpecification::<Order>::json()
            .method(Method::POST)
            .body("qty > 10", |order: &Order| order.qty > 10)
            .build(),
        respond_with(|_| ResponseDefinition::status(StatusCode::CREATED)),
    );
    state.registry().add(Arc::new(stub)).unwrap();

    let post = |body: &'static str| {
        Request::builder()
            .method(Method::POST)
            .uri("/orders")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    };

    let big = handle_request(post(r#"{"qty": 12}"#), Arc::clone(&state)).await.unwrap();
    assert_eq!(big.status(), StatusCode::CREATED);
    let small = handle_request(post(r#"{"qty": 1}"#), Arc::clone(&state)).await.unwrap();
    assert_eq!(small.status(), StatusCode::NOT_FOUND);
    let garbage = handle_request(post("not json"), Arc::clone(&state)).await.unwrap();
    assert_eq!(garbage.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_path_on_empty_registry() {
    let state = state(false, JournalMode::Lean);

    let response = handle_request(get("/unknown"), Arc::clone(&state)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_string(response).await,
        "No matched mapping for request: GET /unknown"
    );

    let unmatched = state.journal().unmatched();
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].method, "GET");
    assert_eq!(unmatched[0].uri, "/unknown");
    assert!(state.journal().matched().is_empty());
}
