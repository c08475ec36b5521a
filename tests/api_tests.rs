mod common;

use reqwest::Client;
use serde_json::{json, Value};

use common::engine::{unreachable_port, FakeEngine};
use common::products;
use common::server::{start_test_server, test_config};
use switchyard::config::ClusterConfig;
use switchyard::types::ClusterRole;

async fn serve(engine: &FakeEngine) -> String {
    start_test_server(test_config(vec![
        engine.cluster_config("primary", ClusterRole::Critical)
    ]))
    .await
}

async fn post(client: &Client, url: String, body: Value) -> reqwest::Response {
    client.post(url).json(&body).send().await.unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;

    let resp = reqwest::get(format!("{base_url}/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_readiness_tracks_critical_clusters() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    let resp = reqwest::get(format!("{base_url}/readyz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["clusters"]["primary"]["reachable"], true);
    assert_eq!(body["families"]["products"]["alias"], "products_test");
    assert_eq!(body["families"]["products"]["serving"], false);

    let resp = post(
        &Client::new(),
        format!("{base_url}/v1/families/products/reindex"),
        json!({"document_type": "product", "records": products(&["1"])}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = reqwest::get(format!("{base_url}/readyz")).await.unwrap().json().await.unwrap();
    assert_eq!(body["families"]["products"]["serving"], true);

    let down = ClusterConfig {
        name: "down".to_string(),
        host: "127.0.0.1".to_string(),
        port: unreachable_port().await,
        role: ClusterRole::Critical,
    };
    let base_url = start_test_server(test_config(vec![
        engine.cluster_config("primary", ClusterRole::Critical),
        down,
    ]))
    .await;
    let resp = reqwest::get(format!("{base_url}/readyz")).await.unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["clusters"]["down"]["reachable"], false);
}

#[tokio::test]
async fn test_readiness_ignores_dispensable_clusters() {
    let engine = FakeEngine::start().await;
    let backup = ClusterConfig {
        name: "backup".to_string(),
        host: "127.0.0.1".to_string(),
        port: unreachable_port().await,
        role: ClusterRole::Dispensable,
    };
    let base_url = start_test_server(test_config(vec![
        engine.cluster_config("primary", ClusterRole::Critical),
        backup,
    ]))
    .await;
    let resp = reqwest::get(format!("{base_url}/readyz")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_family_listing_and_unknown_family() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;

    let resp = reqwest::get(format!("{base_url}/v1/families")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let families = body.as_array().unwrap();
    assert_eq!(families.len(), 1);
    assert_eq!(families[0]["name"], "products");
    assert_eq!(families[0]["alias"], "products_test");
    assert_eq!(families[0]["importing_alias"], "products_test_importing");
    assert_eq!(families[0]["state"], "absent");
    assert_eq!(families[0]["document_types"], json!(["product"]));

    let resp = reqwest::get(format!("{base_url}/v1/families/nope")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], 404);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_manual_lifecycle_over_http() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    let client = Client::new();
    let family = format!("{base_url}/v1/families/products");

    let resp = client.post(format!("{family}/generations")).send().await.unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let generation = body["generation"].as_str().unwrap().to_string();
    assert!(generation.starts_with("products_test_"));

    let resp = post(&client, format!("{family}/import/begin"), json!({"generation": generation})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["state"], "importing");
    assert_eq!(body["importing"], generation.as_str());

    let resp = post(
        &client,
        format!("{family}/import"),
        json!({"document_type": "product", "records": products(&["1", "2", "3"])}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["imported"], 3);
    assert_eq!(engine.document_count(&generation), 3);

    let resp = post(&client, format!("{family}/switch"), json!({"generation": generation})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["state"], "live");
    assert_eq!(body["live"], generation.as_str());
    assert!(body["importing"].is_null());
    assert_eq!(engine.holders("products_test"), vec![generation.clone()]);
    assert!(engine.holders("products_test_importing").is_empty());
}

#[tokio::test]
async fn test_import_without_begin_conflicts() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    let resp = post(
        &Client::new(),
        format!("{base_url}/v1/families/products/import"),
        json!({"document_type": "product", "records": products(&["1"])}),
    )
    .await;
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn test_switch_to_foreign_generation_rejected() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    let resp = post(
        &Client::new(),
        format!("{base_url}/v1/families/products/switch"),
        json!({"generation": "orders_test_20130514124608"}),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_document_writes_over_http() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    let client = Client::new();
    let family = format!("{base_url}/v1/families/products");

    let resp = post(&client, format!("{family}/reindex"), json!({"document_type": "product", "records": []})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let generation = body["generation"].as_str().unwrap().to_string();

    let resp = client
        .put(format!("{family}/documents/product"))
        .json(&json!({"id": "7", "name": "anvil", "price": 12.0}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"id": "7", "type": "product"}));

    let resp = post(
        &client,
        format!("{family}/documents/product/bulk"),
        json!({"records": products(&["8", "9"])}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["stored"], 2);
    assert_eq!(engine.document_count(&generation), 3);

    let resp = client
        .patch(format!("{family}/documents/product/7"))
        .json(&json!({"fields": {"price": 15.0}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(engine.document(&generation, "product", "7").unwrap()["price"], 15.0);

    let resp = client
        .delete(format!("{family}/documents/product/8"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert!(engine.document(&generation, "product", "8").is_none());
}

#[tokio::test]
async fn test_document_write_errors() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    let client = Client::new();
    let family = format!("{base_url}/v1/families/products");

    // Nothing live or importing yet.
    let resp = client
        .put(format!("{family}/documents/product"))
        .json(&json!({"id": "1", "name": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = post(&client, format!("{family}/documents/product/bulk"), json!({"records": []})).await;
    assert_eq!(resp.status(), 400);

    let resp = client
        .put(format!("{family}/documents/order"))
        .json(&json!({"id": "1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .patch(format!("{family}/documents/product/1"))
        .json(&json!({"fields": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_search_pagination_fields() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    let client = Client::new();
    let family = format!("{base_url}/v1/families/products");

    let ids: Vec<String> = (1..=25).map(|i| format!("{i:02}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let resp = post(
        &client,
        format!("{family}/reindex"),
        json!({"document_type": "product", "records": products(&id_refs)}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = post(
        &client,
        format!("{family}/search"),
        json!({"query": {"query": {"match_all": {}}, "facets": {"type": {}}}, "from": 10, "size": 10}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["total"], 25);
    assert_eq!(body["current_page"], 2);
    assert_eq!(body["per_page"], 10);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["next_page"], 3);
    assert_eq!(body["previous_page"], 1);
    assert_eq!(body["out_of_bounds"], false);
    assert_eq!(body["ids"].as_array().unwrap().len(), 10);
    assert_eq!(body["ids"][0], "11");
    assert!(body["facets"]["type"].is_object());

    let resp = post(&client, format!("{family}/search"), json!({"from": 40, "size": 10})).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["out_of_bounds"], true);
    assert!(body["ids"].as_array().unwrap().is_empty());

    let resp = post(&client, format!("{family}/search"), json!({"from": u64::MAX, "size": 10})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["out_of_bounds"], true);
    assert_eq!(body["next_page"], Value::Null);
}

#[tokio::test]
async fn test_reindex_and_cleanup_over_http() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    let client = Client::new();
    let family = format!("{base_url}/v1/families/products");

    let mut generations = Vec::new();
    for _ in 0..3 {
        let resp = post(
            &client,
            format!("{family}/reindex"),
            json!({"document_type": "product", "records": products(&["1", "2", "3"])}),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["imported"], 3);
        generations.push(body["generation"].as_str().unwrap().to_string());
    }

    // Each reindex retires its own stale generations.
    assert_eq!(engine.index_names(), generations[1..].to_vec());
    assert!(engine.is_closed(&generations[1]));
    assert_eq!(engine.holders("products_test"), vec![generations[2].clone()]);

    let resp = client.post(format!("{family}/cleanup")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["deleted"], json!([]));
    assert_eq!(body["closed"], generations[1].as_str());
}

#[tokio::test]
async fn test_rebuild_over_http() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    let client = Client::new();
    let family = format!("{base_url}/v1/families/products");

    let resp = post(
        &client,
        format!("{family}/rebuild"),
        json!({"document_type": "product", "records": products(&["1", "2"])}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let generation = body["generation"].as_str().unwrap().to_string();
    assert_eq!(engine.holders("products_test"), vec![generation.clone()]);
    assert_eq!(engine.document_count(&generation), 2);

    let resp = post(&client, format!("{family}/rebuild"), json!({"records": []})).await;
    assert_eq!(resp.status(), 400);

    let resp = post(&client, format!("{family}/rebuild"), json!({"switch": true})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["generation"], generation.as_str());
    assert_eq!(engine.document_count(&generation), 0);
}

#[tokio::test]
async fn test_engine_failure_maps_to_bad_gateway() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    engine.fail_all(true);

    let resp = Client::new()
        .post(format!("{base_url}/v1/families/products/generations"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;

    Client::new()
        .post(format!("{base_url}/v1/families/products/generations"))
        .send()
        .await
        .unwrap();

    let resp = reqwest::get(format!("{base_url}/metrics")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let text = resp.text().await.unwrap();
    assert!(text.contains("switchyard_http_requests_total"));
    assert!(text.contains("switchyard_http_request_duration_seconds"));
    assert!(text.contains("switchyard_lifecycle_transitions_total"));
    assert!(text.contains(r#"family="products""#));
}

#[tokio::test]
async fn test_unknown_family_does_not_become_a_metric_label() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;

    let resp = reqwest::get(format!("{base_url}/v1/families/no-such-family-label"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let text = reqwest::get(format!("{base_url}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!text.contains("no-such-family-label"));
    assert!(text.contains(r#"family="unknown""#));
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let engine = FakeEngine::start().await;
    let base_url = serve(&engine).await;
    let client = Client::new();

    let resp = client
        .get(format!("{base_url}/v1/families"))
        .header("x-request-id", "reindex-nightly-7")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "reindex-nightly-7");

    let resp = client.get(format!("{base_url}/v1/families")).send().await.unwrap();
    let generated = resp.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}
