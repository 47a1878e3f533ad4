mod common;

use common::TestApp;
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
async fn registration_then_login_returns_a_bearer_token() {
    let app = TestApp::spawn().await;
    let email = format!("{}@example.test", Uuid::new_v4());

    let res = app
        .client
        .post(app.url("/api/register"))
        .json(&json!({ "email": email, "password": "correct horse battery staple" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert!(body["userId"].is_i64());
    assert_eq!(body["email"], email);

    let device_uuid = Uuid::new_v4();
    let res = app
        .client
        .post(app.url("/api/login"))
        .json(&json!({
            "email": email,
            "password": "correct horse battery staple",
            "deviceUuid": device_uuid,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn registering_the_same_email_twice_is_rejected() {
    let app = TestApp::spawn().await;
    let email = format!("{}@example.test", Uuid::new_v4());
    let payload = json!({ "email": email, "password": "correct horse battery staple" });

    let first = app.client.post(app.url("/api/register")).json(&payload).send().await.unwrap();
    assert_eq!(first.status(), 200);

    let second = app.client.post(app.url("/api/register")).json(&payload).send().await.unwrap();
    assert!(second.status().is_client_error(), "expected a 4xx on duplicate registration, got {}", second.status());
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = TestApp::spawn().await;
    let email = format!("{}@example.test", Uuid::new_v4());
    app.client
        .post(app.url("/api/register"))
        .json(&json!({ "email": email, "password": "correct horse battery staple" }))
        .send()
        .await
        .unwrap();

    let res = app
        .client
        .post(app.url("/api/login"))
        .json(&json!({ "email": email, "password": "wrong password", "deviceUuid": Uuid::new_v4() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn login_issues_independent_tokens_per_device() {
    let app = TestApp::spawn().await;
    let email = format!("{}@example.test", Uuid::new_v4());
    app.client
        .post(app.url("/api/register"))
        .json(&json!({ "email": email, "password": "correct horse battery staple" }))
        .send()
        .await
        .unwrap();

    let device_a = Uuid::new_v4();
    let device_b = Uuid::new_v4();
    let login = |device: Uuid| {
        app.client
            .post(app.url("/api/login"))
            .json(&json!({ "email": &email, "password": "correct horse battery staple", "deviceUuid": device }))
            .send()
    };

    let res_a: Value = login(device_a).await.unwrap().json().await.unwrap();
    let res_b: Value = login(device_b).await.unwrap().json().await.unwrap();
    assert_ne!(res_a["token"], res_b["token"]);

    // A device's token only authenticates requests carrying that device's uuid.
    let res = app
        .client
        .get(app.url("/api/files"))
        .bearer_auth(res_a["token"].as_str().unwrap())
        .header("X-Device-UUID", device_b.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
}
