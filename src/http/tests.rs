//! Tests for the HTTP client module

use super::*;
use crate::context::RequestContext;
use crate::manifest::{load_manifest_from_str, Manifest};
use crate::transform::Pipeline;
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

fn manifest(json: &str) -> Manifest {
    load_manifest_from_str(json).unwrap()
}

fn simple_manifest() -> Manifest {
    manifest(
        r#"{
  "id": "t",
  "reqs": [{"name": "items", "url": "https://ex/items"}],
  "datasets": []
}"#,
    )
}

#[tokio::test]
async fn test_get_parses_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": 1}]
        })))
        .mount(&server)
        .await;

    let manifest = simple_manifest();
    let request = manifest.request("items").unwrap();
    let pipeline = Pipeline::for_request(&manifest, request);
    let client = HttpClient::new().unwrap();

    let outcome = client
        .request(
            &format!("{}/api/items", server.uri()),
            request,
            &pipeline,
            &RequestContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.response.status, 200);
    assert_eq!(outcome.response.body["results"][0]["id"], 1);
    assert!(outcome.response.full_body.contains("results"));
    assert!(!outcome.needs_reauth);
}

#[tokio::test]
async fn test_non_json_body_stays_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
        .mount(&server)
        .await;

    let manifest = simple_manifest();
    let request = manifest.request("items").unwrap();
    let pipeline = Pipeline::for_request(&manifest, request);
    let client = HttpClient::new().unwrap();

    let outcome = client
        .request(&server.uri(), request, &pipeline, &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(outcome.response.body, json!("plain text"));
    assert_eq!(outcome.response.full_body, "plain text");
}

#[tokio::test]
async fn test_post_body_and_headers_interpolated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .and(header("Content-Type", "application/json"))
        .and(header("X-Account", "a-9"))
        .and(body_string(r#"{"q": "widgets"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let manifest = manifest(
        r#"{
  "id": "t",
  "reqs": [{
    "name": "search",
    "url": "https://ex/api/search",
    "method": "POST",
    "body": "{\"q\": \"{{term}}\"}",
    "headers": {"X-Account": "{{account_id}}"}
  }],
  "datasets": []
}"#,
    );
    let request = manifest.request("search").unwrap();
    let pipeline = Pipeline::for_request(&manifest, request);

    let mut ctx = RequestContext::new();
    ctx.extracted_data.insert("term".into(), json!("widgets"));
    ctx.extracted_data.insert("account_id".into(), json!("a-9"));

    let client = HttpClient::new().unwrap();
    let outcome = client
        .request(
            &format!("{}/api/search", server.uri()),
            request,
            &pipeline,
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(outcome.response.status, 200);
}

#[tokio::test]
async fn test_retry_ladder_then_success() {
    struct Ladder;
    impl Respond for Ladder {
        fn respond(&self, _: &wiremock::Request) -> ResponseTemplate {
            use std::sync::atomic::{AtomicU32, Ordering};
            static CALLS: AtomicU32 = AtomicU32::new(0);
            let call = CALLS.fetch_add(1, Ordering::SeqCst);
            if call < 2 {
                ResponseTemplate::new(429)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"ok": true}))
            }
        }
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(Ladder)
        .expect(3)
        .mount(&server)
        .await;

    let manifest = manifest(
        r#"{
  "id": "t",
  "transformers": [
    {"name": "retry", "retrywhere": {"conditions": [{"status": 429}], "retries": 2, "initialDelay": 10}}
  ],
  "reqs": [{"name": "flaky", "url": "https://ex/flaky", "transformers": ["retry"]}],
  "datasets": []
}"#,
    );
    let request = manifest.request("flaky").unwrap();
    let pipeline = Pipeline::for_request(&manifest, request);
    let client = HttpClient::new().unwrap();

    let outcome = client
        .request(
            &format!("{}/flaky", server.uri()),
            request,
            &pipeline,
            &RequestContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.response.status, 200);
    assert_eq!(outcome.response.body["ok"], true);
}

#[tokio::test]
async fn test_fail_condition_raises_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "forbidden"})))
        .expect(1)
        .mount(&server)
        .await;

    let manifest = manifest(
        r#"{
  "id": "t",
  "transformers": [
    {"name": "guard", "failwhere": {"conditions": [{"status": 403, "message": "no access"}]}}
  ],
  "reqs": [{"name": "items", "url": "https://ex/items", "transformers": ["guard"]}],
  "datasets": []
}"#,
    );
    let request = manifest.request("items").unwrap();
    let pipeline = Pipeline::for_request(&manifest, request);
    let client = HttpClient::new().unwrap();

    let err = client
        .request(&server.uri(), request, &pipeline, &RequestContext::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no access"));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_reauth_condition_flagged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({})))
        .mount(&server)
        .await;

    let manifest = manifest(
        r#"{
  "id": "t",
  "transformers": [
    {"name": "session", "reauthwhere": {"conditions": [{"status": 401}]}}
  ],
  "reqs": [{"name": "items", "url": "https://ex/items", "transformers": ["session"]}],
  "datasets": []
}"#,
    );
    let request = manifest.request("items").unwrap();
    let pipeline = Pipeline::for_request(&manifest, request);
    let client = HttpClient::new().unwrap();

    let outcome = client
        .request(&server.uri(), request, &pipeline, &RequestContext::new())
        .await
        .unwrap();
    assert!(outcome.needs_reauth);
    assert_eq!(outcome.response.status, 401);
}

#[tokio::test]
async fn test_exhausted_retries_returns_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let manifest = manifest(
        r#"{
  "id": "t",
  "transformers": [
    {"name": "retry", "retrywhere": {"conditions": [{"status": 429}], "retries": 2, "initialDelay": 5}}
  ],
  "reqs": [{"name": "items", "url": "https://ex/items", "transformers": ["retry"]}],
  "datasets": []
}"#,
    );
    let request = manifest.request("items").unwrap();
    let pipeline = Pipeline::for_request(&manifest, request);
    let client = HttpClient::new().unwrap();

    let outcome = client
        .request(&server.uri(), request, &pipeline, &RequestContext::new())
        .await
        .unwrap();
    // The attempt ceiling hands the last response back unclassified.
    assert_eq!(outcome.response.status, 429);
}
