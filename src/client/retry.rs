//! Retry classification for the upload pipeline's network calls.

use backon::ExponentialBuilder;
use std::time::Duration;

const MAX_ATTEMPTS: usize = 3;
const MIN_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(8);

/// Classifies a `reqwest` error as retryable: timeouts, connection
/// reset/refused, DNS failures (all surface as connect errors in `reqwest`),
/// and 5xx responses.
#[must_use]
pub fn is_retryable(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }
    err.status().is_some_and(|status| status.is_server_error())
}

#[must_use]
pub fn retry_strategy() -> ExponentialBuilder {
    ExponentialBuilder::default().with_min_delay(MIN_DELAY).with_max_delay(MAX_DELAY).with_max_times(MAX_ATTEMPTS)
}
