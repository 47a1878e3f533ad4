mod common;

use common::TestApp;

#[tokio::test]
async fn missing_bearer_token_is_unauthorized() {
    let app = TestApp::spawn().await;
    let res = app.client.get(app.url("/api/files")).send().await.unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn missing_device_uuid_header_is_a_bad_request() {
    let app = TestApp::spawn().await;
    let session = app.register_and_login().await;
    let res = app.client.get(app.url("/api/files")).bearer_auth(&session.token).send().await.unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn garbage_bearer_token_is_unauthorized() {
    let app = TestApp::spawn().await;
    let res = app
        .client
        .get(app.url("/api/files"))
        .bearer_auth("not-a-real-token")
        .header("X-Device-UUID", "whatever")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn mismatched_device_uuid_is_forbidden() {
    let app = TestApp::spawn().await;
    let session = app.register_and_login().await;
    let res = app
        .client
        .get(app.url("/api/files"))
        .bearer_auth(&session.token)
        .header("X-Device-UUID", "some-other-device")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn a_valid_session_can_list_its_own_empty_files() {
    let app = TestApp::spawn().await;
    let session = app.register_and_login().await;
    let res = session.authed(app.client.get(app.url("/api/files"))).send().await.unwrap();
    assert_eq!(res.status(), 200);
}
