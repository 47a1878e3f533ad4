mod common;

use common::TestApp;
use serde_json::json;
use sha2::Digest;

#[tokio::test]
async fn downloading_a_missing_classic_file_is_not_found() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;
    let res = session.authed(app.client.get(app.url("/api/files/does-not-exist.jpg"))).send().await.unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn raw_upload_without_filename_header_is_a_bad_request() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;
    let res = session.authed(app.client.post(app.url("/api/upload/raw"))).body(vec![1, 2, 3]).send().await.unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn chunk_upload_with_mismatched_declared_hash_is_rejected() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;
    let chunk = b"actual-bytes".to_vec();

    let res = session
        .authed(app.client.post(app.url("/api/cloud/chunks")))
        .header("content-type", "application/octet-stream")
        .header("X-Chunk-Id", "f".repeat(64))
        .body(chunk)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn chunk_upload_with_malformed_chunk_id_is_rejected() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;

    let res = session
        .authed(app.client.post(app.url("/api/cloud/chunks")))
        .header("content-type", "application/octet-stream")
        .header("X-Chunk-Id", "not-a-hex-digest")
        .body(b"whatever".to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn fetching_a_missing_manifest_is_not_found() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;
    let res = session.authed(app.client.get(app.url(&format!("/api/cloud/manifests/{}", "b".repeat(64))))).send().await.unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn webhook_without_the_shared_secret_is_unauthorized() {
    let app = TestApp::spawn().await;
    let res = app
        .client
        .post(app.url("/api/revenuecat/webhook"))
        .json(&json!({ "externalAppUserId": "someone", "status": "active" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn webhook_for_an_unbound_external_id_is_not_found() {
    let app = TestApp::spawn().await;
    let res = app
        .client
        .post(app.url("/api/revenuecat/webhook"))
        .bearer_auth(&app.config.auth.revenuecat_webhook_secret.clone().unwrap())
        .json(&json!({ "externalAppUserId": "no-such-user", "status": "active" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn malformed_json_body_is_a_bad_request() {
    let app = TestApp::spawn().await;
    let res = app
        .client
        .post(app.url("/api/register"))
        .header("content-type", "application/json")
        .body("{ not valid json")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_client_error());
}
