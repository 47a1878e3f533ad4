mod common;

use common::TestApp;
use serde_json::{Value, json};

async fn upload_manifest(app: &TestApp, session: &common::TestSession, n: usize) {
    let body = json!({
        "manifestId": format!("{:064x}", n),
        "encryptedManifest": format!("{}{}", "0".repeat(48), hex::encode(format!("manifest-{n}"))),
        "chunkCount": 1,
    });
    let res = session.authed(app.client.post(app.url("/api/cloud/manifests"))).json(&body).send().await.unwrap();
    assert_eq!(res.status(), 200, "manifest {n} upload failed: {:?}", res.text().await);
}

#[tokio::test]
async fn manifest_listing_reports_total_and_respects_limit() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;

    for n in 0..5 {
        upload_manifest(&app, &session, n).await;
    }

    let res = session
        .authed(app.client.get(app.url("/api/cloud/manifests")))
        .query(&[("offset", "0"), ("limit", "2")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total"], 5);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["manifests"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn manifest_listing_pages_through_every_entry_exactly_once() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;

    for n in 0..7 {
        upload_manifest(&app, &session, n).await;
    }

    let mut seen = std::collections::HashSet::new();
    let mut offset = 0usize;
    loop {
        let res = session
            .authed(app.client.get(app.url("/api/cloud/manifests")))
            .query(&[("offset", offset.to_string()), ("limit", "3".to_string())])
            .send()
            .await
            .unwrap();
        let body: Value = res.json().await.unwrap();
        let page = body["manifests"].as_array().unwrap().clone();
        if page.is_empty() {
            break;
        }
        for entry in &page {
            seen.insert(entry["manifestId"].as_str().unwrap().to_string());
        }
        offset += page.len();
        if offset >= body["total"].as_u64().unwrap() as usize {
            break;
        }
    }
    assert_eq!(seen.len(), 7);
}

#[tokio::test]
async fn classic_file_listing_reports_pagination_fields() {
    let app = TestApp::spawn().await;
    let session = app.register_with_plan(5).await;

    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        let bytes = format!("contents-of-{name}").into_bytes();
        let res = session
            .authed(app.client.post(app.url("/api/upload/raw")))
            .header("X-Filename", name)
            .body(bytes)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }

    let res = session
        .authed(app.client.get(app.url("/api/files")))
        .query(&[("offset", "0"), ("limit", "2")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total"], 3);
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
}
