//! End-to-end tests driving the public library API

use precog_extract::engine::Executor;
use precog_extract::http::HttpClient;
use precog_extract::manifest::load_manifest_from_str;
use precog_extract::oauth::OAuth2Coordinator;
use precog_extract::store::TokenStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

async fn run_manifest(manifest_json: &str) -> (precog_extract::engine::RunSummary, TempDir) {
    let manifest = load_manifest_from_str(manifest_json).unwrap();
    let store_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();

    let mut executor = Executor::new(
        &manifest,
        HashMap::new(),
        TokenStore::with_dir(store_dir.path(), &manifest.id),
        HttpClient::new().unwrap(),
        OAuth2Coordinator::new(0),
    );
    let summary = executor.run(output_dir.path()).await.unwrap();
    (summary, output_dir)
}

fn read_dataset(dir: &TempDir, file: &str) -> Vec<Value> {
    let text = std::fs::read_to_string(dir.path().join(file)).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn no_auth_single_dataset_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": 1}, {"id": 2}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (summary, output_dir) = run_manifest(&format!(
        r#"{{
  "id": "example-items",
  "reqs": [{{"name": "items", "url": "{}/api/items"}}],
  "datasets": [{{"name": "Items", "data": ["items"]}}]
}}"#,
        server.uri()
    ))
    .await;

    assert_eq!(summary.manifest_id, "example-items");
    assert_eq!(summary.stats.total_requests, 1);
    assert_eq!(summary.stats.successful_requests, 1);
    assert_eq!(summary.stats.failed_requests, 0);
    assert_eq!(
        read_dataset(&output_dir, "items.json"),
        vec![json!({"id": 1}), json!({"id": 2})]
    );
}

#[tokio::test]
async fn cartesian_product_traversal_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/dims"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nums": [1, 2],
            "tags": ["p", "q"]
        })))
        .mount(&server)
        .await;
    for (n, t) in [(1, "p"), (1, "q"), (2, "p"), (2, "q")] {
        Mock::given(method("GET"))
            .and(path(format!("/api/cell/{n}/{t}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"cell": format!("{n}-{t}")})),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let (summary, output_dir) = run_manifest(&format!(
        r#"{{
  "id": "cartesian",
  "reqs": [
    {{"name": "dims", "url": "{0}/api/dims"}},
    {{"name": "cells", "url": "{0}/api/cell/{{{{n}}}}/{{{{t}}}}"}}
  ],
  "deps": [
    {{
      "from": ["dims"], "to": ["cells"],
      "select": [
        {{"name": "n", "path": "$.nums[*]"}},
        {{"name": "t", "path": "$.tags[*]"}}
      ]
    }}
  ],
  "datasets": [{{"name": "Cells", "data": ["cells"]}}]
}}"#,
        server.uri()
    ))
    .await;

    assert_eq!(summary.stats.total_requests, 5);

    // Lexicographic index order over the product: first name outermost.
    let cells = read_dataset(&output_dir, "cells.json");
    assert_eq!(
        cells,
        vec![
            json!({"cell": "1-p"}),
            json!({"cell": "1-q"}),
            json!({"cell": "2-p"}),
            json!({"cell": "2-q"}),
        ]
    );
}

#[tokio::test]
async fn retry_ladder_recovers_within_run() {
    struct Ladder;
    impl Respond for Ladder {
        fn respond(&self, _: &wiremock::Request) -> ResponseTemplate {
            use std::sync::atomic::{AtomicU32, Ordering};
            static CALLS: AtomicU32 = AtomicU32::new(0);
            if CALLS.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(429)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"results": [{"ok": true}]}))
            }
        }
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(Ladder)
        .expect(3)
        .mount(&server)
        .await;

    let (summary, output_dir) = run_manifest(&format!(
        r#"{{
  "id": "flaky",
  "transformers": [
    {{"name": "retry", "retrywhere": {{"conditions": [{{"status": 429}}], "retries": 2, "initialDelay": 10}}}}
  ],
  "reqs": [{{"name": "flaky", "url": "{}/api/flaky", "transformers": ["retry"]}}],
  "datasets": [{{"name": "Flaky", "data": ["flaky"]}}]
}}"#,
        server.uri()
    ))
    .await;

    // One logical request, recovered by in-flight retries.
    assert_eq!(summary.stats.total_requests, 1);
    assert_eq!(summary.stats.failed_requests, 0);
    assert_eq!(
        read_dataset(&output_dir, "flaky.json"),
        vec![json!({"ok": true})]
    );
}

#[tokio::test]
async fn auth_state_survives_across_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t-1"})))
        .mount(&server)
        .await;

    let manifest = load_manifest_from_str(&format!(
        r#"{{
  "id": "durable",
  "reqs": [
    {{"name": "login", "url": "{0}/api/login"}},
    {{"name": "after", "url": "{0}/api/after"}}
  ],
  "deps": [
    {{"from": ["login"], "to": ["after"], "select": [{{"name": "session", "path": "$.token", "authy": true}}]}}
  ],
  "datasets": []
}}"#,
        server.uri()
    ))
    .unwrap();

    let store_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let store = TokenStore::with_dir(store_dir.path(), &manifest.id);

    let mut executor = Executor::new(
        &manifest,
        HashMap::new(),
        store.clone(),
        HttpClient::new().unwrap(),
        OAuth2Coordinator::new(0),
    );
    executor.run(output_dir.path()).await.unwrap();

    // The authy value landed on disk and reads back in a fresh store.
    let reloaded = TokenStore::with_dir(store_dir.path(), &manifest.id)
        .load()
        .await
        .unwrap();
    assert_eq!(reloaded.authy_value("session"), Some(&json!("t-1")));
    assert_eq!(store.load().await.unwrap(), reloaded);
}
