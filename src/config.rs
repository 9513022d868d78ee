//! Scheduling and refresh policy for the session coordinator.
//!
//! The cadences below were tuned against real deployments; none of the
//! specific numbers are load-bearing beyond "refresh comfortably before
//! expiry, more conservatively when the session is not meant to persist".
//! Hosts that need different behavior override the fields instead of
//! patching constants.

use std::time::Duration;

/// Remaining access-token life at or below which a refresh is triggered.
/// 5 minutes renews comfortably before expiry, tolerating clock skew and
/// slow networks.
const REFRESH_THRESHOLD_SECS: u64 = 300;

/// Periodic refresh-if-needed cadence for remembered sessions.
const REMEMBERED_CHECK_INTERVAL_SECS: u64 = 15 * 60;

/// Cadence for recomputing the externally visible time-remaining counter.
/// No network call is made on this timer.
const COUNTDOWN_INTERVAL_SECS: u64 = 30;

/// Check cadence for sessions without "remember me". Deliberately more
/// conservative: no speculative pre-expiry refresh.
const SHORT_SESSION_CHECK_INTERVAL_SECS: u64 = 2 * 60;

/// Fixed backoff before the single retry after a transient refresh failure.
const RETRY_BACKOFF_SECS: u64 = 30;

/// Delay after a hidden-to-visible transition before the refresh check runs,
/// letting the event loop settle.
const VISIBILITY_SETTLE_DELAY_MS: u64 = 1000;

/// Fallback refresh-token lifetime when the token itself carries no expiry
/// claim. Only meaningful for remembered sessions.
const REFRESH_TOKEN_LIFETIME_DAYS: i64 = 30;

/// Policy knobs for the session coordinator.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Refresh when remaining access-token life is at or below this.
    pub refresh_threshold: Duration,
    /// Periodic check interval for remembered sessions.
    pub remembered_check_interval: Duration,
    /// Time-remaining counter recompute interval (remembered sessions).
    pub countdown_interval: Duration,
    /// Check interval for sessions without "remember me".
    pub short_session_check_interval: Duration,
    /// Backoff before the single retry of a transiently failed refresh.
    pub retry_backoff: Duration,
    /// Settle delay between a visibility event and the refresh check.
    pub visibility_settle_delay: Duration,
    /// Assumed refresh-token lifetime when the token carries no expiry.
    pub refresh_token_lifetime: chrono::Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            refresh_threshold: Duration::from_secs(REFRESH_THRESHOLD_SECS),
            remembered_check_interval: Duration::from_secs(REMEMBERED_CHECK_INTERVAL_SECS),
            countdown_interval: Duration::from_secs(COUNTDOWN_INTERVAL_SECS),
            short_session_check_interval: Duration::from_secs(SHORT_SESSION_CHECK_INTERVAL_SECS),
            retry_backoff: Duration::from_secs(RETRY_BACKOFF_SECS),
            visibility_settle_delay: Duration::from_millis(VISIBILITY_SETTLE_DELAY_MS),
            refresh_token_lifetime: chrono::Duration::days(REFRESH_TOKEN_LIFETIME_DAYS),
        }
    }
}

impl SessionPolicy {
    /// Refresh threshold in whole seconds, for comparison against
    /// claim-derived remaining lifetimes.
    pub fn refresh_threshold_secs(&self) -> i64 {
        self.refresh_threshold.as_secs() as i64
    }
}
