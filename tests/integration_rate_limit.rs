mod common;

use common::{TestApp, get_test_config};
use photosync_server::adapters::database;
use photosync_server::adapters::paths::DataLayout;
use photosync_server::api::app_router;
use photosync_server::AppBuilder;
use serde_json::json;
use uuid::Uuid;

/// Builds a standalone app with a tight auth rate limit, independent of the
/// generous default `TestApp::spawn()` config every other suite relies on.
async fn spawn_rate_limited(max_requests: u32) -> TestApp {
    let data_dir = tempfile::tempdir().unwrap();
    let mut config = get_test_config(data_dir.path());
    config.rate_limit.auth_rate_limit_max = max_requests;
    config.rate_limit.auth_rate_limit_window_ms = 60_000;

    let layout = std::sync::Arc::new(DataLayout::resolve(&config.storage).unwrap());
    let pool = database::init_pool(&layout.db_path).await.unwrap();
    photosync_server::run_migrations(&pool).await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.server.port = addr.port();

    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let app = AppBuilder::new(config.clone())
        .with_database(pool.clone())
        .with_layout(layout)
        .with_shutdown_rx(shutdown_rx.clone())
        .initialize()
        .await
        .unwrap();
    let router = app_router(&config, app.state, shutdown_rx);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        pool,
        config,
        server_url: format!("http://{addr}"),
        mgmt_url: String::new(),
        client: reqwest::Client::new(),
        _data_dir: data_dir,
        shutdown_tx: _shutdown_tx,
    }
}

#[tokio::test]
async fn login_attempts_past_the_burst_are_throttled() {
    let app = spawn_rate_limited(3).await;
    let payload = json!({ "email": "nobody@example.test", "password": "wrong", "deviceUuid": Uuid::new_v4() });

    let mut saw_429 = false;
    for _ in 0..10 {
        let res = app.client.post(app.url("/api/login")).json(&payload).send().await.unwrap();
        if res.status() == 429 {
            saw_429 = true;
            break;
        }
    }
    assert!(saw_429, "expected at least one 429 once the auth rate limit burst was exhausted");
}

#[tokio::test]
async fn classic_and_cloud_routes_are_not_rate_limited_like_auth_routes() {
    // The governor layer is scoped to /api/register and /api/login only; a
    // generously-configured TestApp should never 429 on ordinary read traffic.
    let app = TestApp::spawn().await;
    let session = app.register_and_login().await;
    for _ in 0..20 {
        let res = session.authed(app.client.get(app.url("/api/files"))).send().await.unwrap();
        assert_ne!(res.status(), 429);
    }
}
