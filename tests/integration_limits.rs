mod common;

use common::TestApp;
use serde_json::Value;
use sha2::Digest;

#[tokio::test]
async fn a_default_plan_cannot_upload() {
    let app = TestApp::spawn().await;
    let session = app.register_and_login().await;

    let res = session
        .authed(app.client.post(app.url("/api/upload/raw")))
        .header("X-Filename", "photo.jpg")
        .body(vec![0u8; 16])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 402);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "SUBSCRIPTION_REQUIRED");
}

#[tokio::test]
async fn a_default_plan_can_still_read_its_empty_file_list() {
    let app = TestApp::spawn().await;
    let session = app.register_and_login().await;
    let res = session.authed(app.client.get(app.url("/api/files"))).send().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn usage_endpoint_reports_quota_headroom_for_a_paid_plan() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(1).await;

    let res = session.authed(app.client.get(app.url("/api/cloud/usage"))).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["planGb"], 1);
    assert_eq!(body["quotaBytes"], 1_000_000_000i64);
    assert_eq!(body["usedBytes"], 0);
    assert_eq!(body["remainingBytes"], 1_000_000_000i64);
}

#[tokio::test]
async fn usage_endpoint_is_visible_even_on_a_default_unsubscribed_plan() {
    let app = TestApp::spawn().await;
    let session = app.register_and_login().await;

    let res = session.authed(app.client.get(app.url("/api/cloud/usage"))).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["quotaBytes"], 0);
}

#[tokio::test]
async fn uploading_within_quota_succeeds_and_is_idempotent_on_replay() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;

    let chunk = vec![9u8; 1024];
    let chunk_id = hex::encode(sha2::Sha256::digest(&chunk));

    for _ in 0..2 {
        let res = session
            .authed(app.client.post(app.url("/api/cloud/chunks")))
            .header("content-type", "application/octet-stream")
            .header("X-Chunk-Id", &chunk_id)
            .body(chunk.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["stored"], true);
    }
}
