use crate::adapters::database::DbPool;
use crate::adapters::paths::DataLayout;
use crate::adapters::storage::ObjectStorage;
use crate::config::{AuthConfig, Config, QuotaConfig};
use crate::services::classic_store_service::ClassicStoreService;
use crate::services::cloud_store_service::CloudStoreService;
use crate::services::credential_service::CredentialService;
use crate::services::health_service::HealthService;
use crate::services::quota_service::QuotaService;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::subscription_service::SubscriptionService;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Router, http::StatusCode};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

pub mod auth;
pub mod capacity;
pub mod classic;
pub mod cloud;
pub mod cloud_usage;
pub mod health;
pub mod middleware;
pub mod rate_limit;
pub mod schemas;
pub mod subscription;

/// Every service and piece of shared configuration a request handler might
/// need. Cloning is cheap: every field is itself an `Arc`, a connection pool
/// handle, or a small value type.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub credential_service: CredentialService,
    pub subscription_service: SubscriptionService,
    pub quota_service: QuotaService,
    pub classic_store_service: ClassicStoreService,
    pub cloud_store_service: CloudStoreService,
    pub rate_limit_service: RateLimitService,
    pub storage: Arc<dyn ObjectStorage>,
    pub layout: Arc<DataLayout>,
    pub auth_config: AuthConfig,
    pub quota_config: QuotaConfig,
}

#[derive(Clone)]
pub struct MgmtState {
    pub health_service: HealthService,
}

/// Builds the public API router: security headers and CORS apply to every
/// route ahead of auth, which each handler then layers with its own
/// subscription/quota checks.
#[must_use]
pub fn app_router(config: &Config, state: AppState, _shutdown_rx: watch::Receiver<bool>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(tower_http::cors::Any)
        .allow_origin(tower_http::cors::Any);

    let auth_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .layer(rate_limit::layer(rate_limit::governor_config(&config.rate_limit)));

    let classic_routes = Router::new()
        .route("/api/upload", post(classic::upload_multipart))
        .route("/api/upload/raw", post(classic::upload_raw))
        .route("/api/files", get(classic::list))
        .route("/api/files/{name}", get(classic::download))
        .route("/api/files/purge", post(classic::purge));

    let cloud_routes = Router::new()
        .route("/api/cloud/chunks", post(cloud::upload_chunk))
        .route("/api/cloud/chunks/{id}", get(cloud::download_chunk))
        .route("/api/cloud/manifests", post(cloud::upload_manifest).get(cloud::list_manifests))
        .route("/api/cloud/manifests/{id}", get(cloud::fetch_manifest))
        .route("/api/cloud/device-state", get(cloud::get_device_state).put(cloud::put_device_state))
        .route("/api/cloud/purge", post(cloud::purge));

    let capacity_routes = Router::new()
        .route("/api/capacity", get(capacity::capacity))
        .route("/.well-known/photosync-capacity.json", get(capacity::capacity))
        .route("/.well-known/stealthcloud-capacity.json", get(capacity::capacity));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_routes)
        .route("/api/subscription/status", get(subscription::status))
        .route("/api/revenuecat/webhook", post(subscription::webhook))
        .route("/api/cloud/usage", get(cloud_usage::usage))
        .merge(classic_routes)
        .merge(cloud_routes)
        .merge(capacity_routes)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(cors)
        .with_state(state)
}

async fn root() -> StatusCode {
    StatusCode::FORBIDDEN
}

async fn health() -> (StatusCode, axum::Json<serde_json::Value>) {
    (StatusCode::OK, axum::Json(serde_json::json!({ "ok": true })))
}

#[must_use]
pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}

/// A fixed `no-store` header, added to every capacity response so clients
/// never cache a stale report across worker ticks.
#[must_use]
pub fn no_store_header() -> HeaderValue {
    HeaderValue::from_static("no-store")
}
