use crate::config::RateLimitConfig;
use crate::services::rate_limit_service::IpKeyExtractor;
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::{GovernorConfig, GovernorConfigBuilder};

/// Builds the sliding-window limiter for `/api/register` and `/api/login`,
/// keyed by peer IP. `tower_governor`'s token bucket approximates a sliding
/// window closely enough that the client-visible contract — 429 past the
/// cap, `X-RateLimit-*` headers — matches.
#[must_use]
pub fn governor_config(config: &RateLimitConfig) -> Arc<GovernorConfig<IpKeyExtractor, tower_governor::governor::NoOpMiddleware>> {
    let per_millis = (config.auth_rate_limit_window_ms / u64::from(config.auth_rate_limit_max.max(1))).max(1);

    Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(per_millis)
            .burst_size(config.auth_rate_limit_max)
            .key_extractor(IpKeyExtractor)
            .finish()
            .expect("valid governor configuration"),
    )
}

#[must_use]
pub fn layer(
    config: Arc<GovernorConfig<IpKeyExtractor, tower_governor::governor::NoOpMiddleware>>,
) -> GovernorLayer<IpKeyExtractor, tower_governor::governor::NoOpMiddleware> {
    GovernorLayer { config }
}
