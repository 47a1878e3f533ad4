mod common;

use common::TestApp;

#[tokio::test]
async fn responses_carry_the_baseline_security_headers() {
    let app = TestApp::spawn().await;
    let res = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(res.headers().get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(res.headers().get("x-frame-options").unwrap(), "DENY");
}

#[tokio::test]
async fn manifest_listing_is_never_cached() {
    let app = TestApp::spawn().await;
    let session = app.register_and_login().await;
    let res = session.authed(app.client.get(app.url("/api/cloud/manifests"))).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers().get("cache-control").unwrap(), "no-store");
}

#[tokio::test]
async fn root_path_is_forbidden() {
    let app = TestApp::spawn().await;
    let res = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn device_state_rejects_oversize_payloads() {
    let app = TestApp::spawn().await;
    let session = app.register_and_login().await;
    let oversize = "a".repeat(200 * 1024);
    let body = format!(r#"{{"padding":"{oversize}"}}"#);

    let res = session
        .authed(app.client.put(app.url("/api/cloud/device-state")))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
}

#[tokio::test]
async fn device_state_rejects_non_object_json() {
    let app = TestApp::spawn().await;
    let session = app.register_and_login().await;

    let res = session
        .authed(app.client.put(app.url("/api/cloud/device-state")))
        .header("content-type", "application/json")
        .body("[1, 2, 3]")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}
