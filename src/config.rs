use clap::Parser;

const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 3000;
const DEFAULT_MGMT_PORT: u16 = 3001;
const DEFAULT_ACCESS_TOKEN_TTL_DAYS: i64 = 30;
const DEFAULT_BCRYPT_ROUNDS: u32 = 10;
const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
const DEFAULT_RATE_LIMIT_MAX: u32 = 10;
const DEFAULT_QUOTA_MARGIN_BYTES: i64 = 50 * 1024 * 1024;
const DEFAULT_GRACE_DAYS: i64 = 3;
const DEFAULT_TRIAL_DAYS: i64 = 7;
const DEFAULT_HEALTH_DB_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_HEALTH_DISK_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_CAPACITY_REPORT_INTERVAL_SECS: u64 = 120;
const DEFAULT_SWEEPER_INTERVAL_SECS: u64 = 1_800;
const DEFAULT_RECONCILER_INTERVAL_SECS: u64 = 900;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration, assembled from env vars (and CLI flags of the same
/// name) the same way `obscura-server`'s `Config` is, but grouped into
/// per-concern sub-configs so that each service only borrows what it needs.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,
    #[command(flatten)]
    pub auth: AuthConfig,
    #[command(flatten)]
    pub storage: StorageConfig,
    #[command(flatten)]
    pub quota: QuotaConfig,
    #[command(flatten)]
    pub subscription: SubscriptionConfig,
    #[command(flatten)]
    pub rate_limit: RateLimitConfig,
    #[command(flatten)]
    pub telemetry: TelemetryConfig,
    #[command(flatten)]
    pub health: HealthConfig,
    #[command(flatten)]
    pub workers: WorkersConfig,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

#[derive(Clone, Debug, Parser)]
pub struct ServerConfig {
    #[arg(long, env, default_value = DEFAULT_SERVER_HOST)]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    #[arg(long, env, default_value_t = DEFAULT_MGMT_PORT)]
    pub mgmt_port: u16,

    #[arg(long, env, default_value_t = false)]
    pub enable_https: bool,

    #[arg(long, env)]
    pub https_port: Option<u16>,

    #[arg(long, env)]
    pub tls_key_path: Option<String>,

    #[arg(long, env)]
    pub tls_cert_path: Option<String>,

    #[arg(long, env, default_value_t = false)]
    pub force_https_redirect: bool,

    #[arg(long, env, default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Parser)]
pub struct AuthConfig {
    /// Shared secret used to sign session tokens. Rejected with a startup
    /// warning if left at the default placeholder value in production.
    #[arg(long, env, default_value = "change-me-in-production")]
    pub jwt_secret: String,

    #[arg(long, env, default_value_t = DEFAULT_ACCESS_TOKEN_TTL_DAYS)]
    pub session_ttl_days: i64,

    /// Password hashing cost. Named for wire/env compatibility with deployments
    /// that historically called this `BCRYPT_ROUNDS`; it feeds the Argon2id
    /// time-cost parameter here.
    #[arg(long, env = "BCRYPT_ROUNDS", default_value_t = DEFAULT_BCRYPT_ROUNDS)]
    pub bcrypt_rounds: u32,

    #[arg(long, env)]
    pub revenuecat_webhook_secret: Option<String>,
}

#[derive(Clone, Debug, Parser)]
pub struct StorageConfig {
    #[arg(long, env)]
    pub photosync_data_dir: Option<String>,

    #[arg(long, env)]
    pub upload_dir: Option<String>,

    #[arg(long, env)]
    pub db_path: Option<String>,

    #[arg(long, env)]
    pub cloud_dir: Option<String>,

    #[arg(long, env)]
    pub capacity_json_path: Option<String>,
}

#[derive(Clone, Debug, Parser)]
pub struct QuotaConfig {
    #[arg(long, env, default_value_t = DEFAULT_QUOTA_MARGIN_BYTES)]
    pub user_quota_margin_bytes: i64,

    #[arg(long, env, default_value_t = true)]
    pub enable_cloud_upload_lock: bool,
}

#[derive(Clone, Debug, Parser)]
pub struct SubscriptionConfig {
    #[arg(long, env, default_value_t = DEFAULT_GRACE_DAYS)]
    pub subscription_grace_days: i64,

    #[arg(long, env, default_value_t = DEFAULT_TRIAL_DAYS)]
    pub trial_days: i64,
}

#[derive(Clone, Debug, Parser)]
pub struct RateLimitConfig {
    #[arg(long, env, default_value_t = DEFAULT_RATE_LIMIT_WINDOW_MS)]
    pub auth_rate_limit_window_ms: u64,

    #[arg(long, env, default_value_t = DEFAULT_RATE_LIMIT_MAX)]
    pub auth_rate_limit_max: u32,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Parser)]
pub struct TelemetryConfig {
    #[arg(long, env, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(long, env)]
    pub otlp_endpoint: Option<String>,

    #[arg(long, env, default_value_t = 1.0)]
    pub trace_sampling_ratio: f64,
}

#[derive(Clone, Debug, Parser)]
pub struct HealthConfig {
    #[arg(long, env, default_value_t = DEFAULT_HEALTH_DB_TIMEOUT_MS)]
    pub db_timeout_ms: u64,

    #[arg(long, env, default_value_t = DEFAULT_HEALTH_DISK_TIMEOUT_MS)]
    pub disk_timeout_ms: u64,
}

/// Scheduling intervals for the background workers (§4.H). An external
/// process-level timer is not assumed; each worker ticks its own interval.
#[derive(Clone, Debug, Parser)]
pub struct WorkersConfig {
    #[arg(long, env, default_value_t = DEFAULT_CAPACITY_REPORT_INTERVAL_SECS)]
    pub capacity_report_interval_secs: u64,

    #[arg(long, env, default_value_t = DEFAULT_SWEEPER_INTERVAL_SECS)]
    pub sweeper_interval_secs: u64,

    #[arg(long, env, default_value_t = DEFAULT_RECONCILER_INTERVAL_SECS)]
    pub reconciler_interval_secs: u64,
}
