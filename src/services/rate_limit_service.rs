use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::net::{IpAddr, SocketAddr};
use tower_governor::GovernorError;
use tower_governor::key_extractor::KeyExtractor;
use tracing::warn;

#[derive(Clone, Debug)]
struct Metrics {
    decisions_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("photosync-server");
        Self {
            decisions_total: meter
                .u64_counter("photosync_rate_limit_decisions_total")
                .with_description("Rate limit decisions (allowed/throttled) for the auth endpoints")
                .build(),
        }
    }
}

/// Keys the sliding-window rate limiter by peer IP, the way `tower_governor`
/// expects. Unlike a reverse-proxy-aware deployment this does not trust
/// `X-Forwarded-For`, since a single-node photosync install has no internal
/// proxy hop to distinguish from the public client.
#[derive(Clone, Debug, Default)]
pub struct IpKeyExtractor;

impl KeyExtractor for IpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitService {
    metrics: Metrics,
}

impl RateLimitService {
    #[must_use]
    pub fn new() -> Self {
        Self { metrics: Metrics::new() }
    }

    pub fn log_decision(&self, status: StatusCode) {
        let label = if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("auth rate limit exceeded");
            "throttled"
        } else {
            "allowed"
        };
        self.metrics.decisions_total.add(1, &[KeyValue::new("status", label)]);
    }
}

impl Default for RateLimitService {
    fn default() -> Self {
        Self::new()
    }
}
