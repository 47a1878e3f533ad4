mod common;

use common::TestApp;
use serde_json::Value;

#[tokio::test]
async fn public_health_endpoint_reports_ok() {
    let app = TestApp::spawn().await;
    let res = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn mgmt_livez_is_always_ok() {
    let app = TestApp::spawn().await;
    let res = app.client.get(app.mgmt("/livez")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn mgmt_readyz_reports_database_and_disk() {
    let app = TestApp::spawn().await;
    let res = app.client.get(app.mgmt("/readyz")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["disk"], "ok");
}
