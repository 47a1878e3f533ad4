mod common;

use common::TestApp;
use serde_json::{Value, json};
use sha2::Digest;

#[tokio::test]
async fn purging_classic_files_deletes_every_upload_and_empties_the_listing() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;

    for name in ["one.jpg", "two.jpg"] {
        let res = session
            .authed(app.client.post(app.url("/api/upload/raw")))
            .header("X-Filename", name)
            .body(format!("bytes for {name}").into_bytes())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }

    let res = session.authed(app.client.post(app.url("/api/files/purge"))).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["deleted"], 2);

    let res = session.authed(app.client.get(app.url("/api/files"))).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn purging_cloud_data_deletes_chunks_and_manifests() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;

    let chunk = b"chunk-payload".to_vec();
    let chunk_id = hex::encode(sha2::Sha256::digest(&chunk));
    session
        .authed(app.client.post(app.url("/api/cloud/chunks")))
        .header("content-type", "application/octet-stream")
        .header("X-Chunk-Id", &chunk_id)
        .body(chunk)
        .send()
        .await
        .unwrap();

    session
        .authed(app.client.post(app.url("/api/cloud/manifests")))
        .json(&json!({
            "manifestId": "a".repeat(64),
            "encryptedManifest": format!("{}deadbeef", "0".repeat(48)),
            "chunkCount": 1,
        }))
        .send()
        .await
        .unwrap();

    let res = session.authed(app.client.post(app.url("/api/cloud/purge"))).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["chunksDeleted"], 1);

    let res = session
        .authed(app.client.get(app.url(&format!("/api/cloud/chunks/{chunk_id}"))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}
