#![allow(dead_code)]
use photosync_server::adapters::database::{self, DbPool};
use photosync_server::adapters::paths::DataLayout;
use photosync_server::api::{MgmtState, app_router, mgmt_router};
use photosync_server::config::{
    AuthConfig, Config, HealthConfig, QuotaConfig, RateLimitConfig, ServerConfig, StorageConfig, SubscriptionConfig,
    TelemetryConfig, WorkersConfig,
};
use photosync_server::{AppBuilder, run_migrations};
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::OnceLock;
use tempfile::TempDir;
use tokio::net::TcpListener;
use uuid::Uuid;

static INIT: OnceLock<()> = OnceLock::new();

pub fn setup_tracing() {
    INIT.get_or_init(|| {
        photosync_server::telemetry::init_test_telemetry();
    });
}

#[must_use]
pub fn get_test_config(data_dir: &std::path::Path) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            mgmt_port: 0,
            enable_https: false,
            https_port: None,
            tls_key_path: None,
            tls_cert_path: None,
            force_https_redirect: false,
            shutdown_timeout_secs: 5,
        },
        auth: AuthConfig {
            jwt_secret: "test-secret-do-not-use-in-production".to_string(),
            session_ttl_days: 30,
            bcrypt_rounds: 4,
            revenuecat_webhook_secret: Some("test-webhook-secret".to_string()),
        },
        storage: StorageConfig {
            photosync_data_dir: Some(data_dir.display().to_string()),
            upload_dir: None,
            db_path: None,
            cloud_dir: None,
            capacity_json_path: None,
        },
        quota: QuotaConfig { user_quota_margin_bytes: 0, enable_cloud_upload_lock: true },
        subscription: SubscriptionConfig { subscription_grace_days: 3, trial_days: 7 },
        rate_limit: RateLimitConfig { auth_rate_limit_window_ms: 60_000, auth_rate_limit_max: 10_000 },
        telemetry: TelemetryConfig { log_format: photosync_server::config::LogFormat::Text, otlp_endpoint: None, trace_sampling_ratio: 1.0 },
        health: HealthConfig { db_timeout_ms: 2_000, disk_timeout_ms: 2_000 },
        workers: WorkersConfig {
            capacity_report_interval_secs: 3_600,
            sweeper_interval_secs: 3_600,
            reconciler_interval_secs: 3_600,
        },
    }
}

pub struct TestApp {
    pub pool: DbPool,
    pub config: Config,
    pub server_url: String,
    pub mgmt_url: String,
    pub client: Client,
    pub _data_dir: TempDir,
    pub shutdown_tx: tokio::sync::watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        setup_tracing();

        let data_dir = tempfile::tempdir().expect("failed to create temp data dir");
        let mut config = get_test_config(data_dir.path());

        let layout = std::sync::Arc::new(DataLayout::resolve(&config.storage).expect("failed to resolve data layout"));
        let pool = database::init_pool(&layout.db_path).await.expect("failed to open test database");
        run_migrations(&pool).await.expect("failed to run migrations");

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("failed to bind test listener");
        let addr = listener.local_addr().expect("failed to read bound addr");
        config.server.port = addr.port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let app = AppBuilder::new(config.clone())
            .with_database(pool.clone())
            .with_layout(layout)
            .with_shutdown_rx(shutdown_rx.clone())
            .initialize()
            .await
            .expect("failed to initialize app");

        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.expect("failed to bind mgmt listener");
        let mgmt_addr = mgmt_listener.local_addr().expect("failed to read bound mgmt addr");
        config.server.mgmt_port = mgmt_addr.port();

        let router = app_router(&config, app.state, shutdown_rx);
        let mgmt = mgmt_router(MgmtState { health_service: app.health_service });

        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("test server exited unexpectedly");
        });
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt).await.expect("test mgmt server exited unexpectedly");
        });

        let client = Client::builder().build().expect("failed to build http client");

        Self {
            pool,
            config,
            server_url: format!("http://{addr}"),
            mgmt_url: format!("http://{mgmt_addr}"),
            client,
            _data_dir: data_dir,
            shutdown_tx,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    #[must_use]
    pub fn mgmt(&self, path: &str) -> String {
        format!("{}{}", self.mgmt_url, path)
    }

    /// Registers a fresh user with a random email and logs a device in,
    /// returning the session token and the device uuid it's bound to.
    pub async fn register_and_login(&self) -> TestSession {
        let email = format!("{}@example.test", Uuid::new_v4());
        let password = "correct horse battery staple";

        let register_res = self
            .client
            .post(self.url("/api/register"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("register request failed");
        assert!(register_res.status().is_success(), "register failed: {:?}", register_res.text().await);

        let device_uuid = Uuid::new_v4();
        let login_res = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({
                "email": email,
                "password": password,
                "deviceUuid": device_uuid,
                "deviceName": "integration-test-device",
            }))
            .send()
            .await
            .expect("login request failed");
        assert!(login_res.status().is_success(), "login failed: {:?}", login_res.text().await);

        let body: Value = login_res.json().await.expect("login response was not JSON");
        let token = body["token"].as_str().expect("login response missing token").to_string();
        let user_id = body["userId"].as_i64().expect("login response missing userId");

        TestSession { email, token, device_uuid: device_uuid.to_string(), user_id }
    }

    /// Registers a fresh user on an explicit plan tier (trial-gated, so
    /// uploads are admitted) and logs a device in.
    pub async fn register_with_plan(&self, plan_gb: i64) -> TestSession {
        let email = format!("{}@example.test", Uuid::new_v4());
        let password = "correct horse battery staple";

        let register_res = self
            .client
            .post(self.url("/api/register"))
            .json(&json!({ "email": email, "password": password, "planGb": plan_gb }))
            .send()
            .await
            .expect("register request failed");
        assert!(register_res.status().is_success(), "register failed: {:?}", register_res.text().await);

        let device_uuid = Uuid::new_v4();
        let login_res = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "email": email, "password": password, "deviceUuid": device_uuid }))
            .send()
            .await
            .expect("login request failed");
        assert!(login_res.status().is_success(), "login failed: {:?}", login_res.text().await);

        let body: Value = login_res.json().await.expect("login response was not JSON");
        let token = body["token"].as_str().expect("login response missing token").to_string();
        let user_id = body["userId"].as_i64().expect("login response missing userId");

        TestSession { email, token, device_uuid: device_uuid.to_string(), user_id }
    }
}

pub struct TestSession {
    pub email: String,
    pub token: String,
    pub device_uuid: String,
    pub user_id: i64,
}

impl TestSession {
    /// Applies the bearer token and device header every authenticated
    /// PhotoSync endpoint expects.
    pub fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.token).header("X-Device-UUID", &self.device_uuid)
    }
}
