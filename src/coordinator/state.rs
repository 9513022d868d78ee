//! Session state owned by the coordinator.

use chrono::{DateTime, Utc};

use crate::error::SessionError;
use crate::store::StoredCredentials;
use crate::token::{self, Identity};

/// Position in the session lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    /// Reading the credential store and settling the initial state.
    Initializing,
    Authenticated,
    Unauthenticated,
    /// A token exchange is in flight. Doubles as the mutual-exclusion flag:
    /// refresh requests arriving in this phase are dropped, not queued.
    Refreshing,
    /// The session died mid-use and could not be recovered. No tokens are
    /// retained; `last_error` says why.
    Error,
}

impl SessionPhase {
    /// True while a live session exists (possibly mid-refresh).
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::Authenticated | SessionPhase::Refreshing)
    }
}

/// Wall-clock source. A seam so expiry arithmetic is testable without
/// sleeping; production uses [`SystemClock`].
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The coordinator's in-memory session. Mutated only through coordinator
/// transitions; consumers observe it as a [`SessionView`].
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub access_expiry_at: Option<DateTime<Utc>>,
    /// Only meaningful for remembered sessions.
    pub refresh_expiry_at: Option<DateTime<Utc>>,
    pub identity: Option<Identity>,
    pub remember_me: bool,
    pub phase: SessionPhase,
    pub last_error: Option<SessionError>,
}

impl SessionState {
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.access_expiry_at.map(|t| (t - now).num_seconds())
    }

    /// An absent expiry counts as expired: a token we cannot place in time
    /// is never trusted.
    pub fn access_expired(&self, now: DateTime<Utc>) -> bool {
        self.seconds_until_expiry(now).map(|s| s <= 0).unwrap_or(true)
    }

    pub fn refresh_token_usable(&self, now: DateTime<Utc>) -> bool {
        refresh_token_usable(self.refresh_token.as_deref(), self.refresh_expiry_at, now)
    }

    pub fn to_stored(&self) -> StoredCredentials {
        StoredCredentials {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            access_expiry_at: self.access_expiry_at,
            refresh_expiry_at: self.refresh_expiry_at,
            remember_me: self.remember_me,
        }
    }

    pub fn view(&self, now: DateTime<Utc>) -> SessionView {
        SessionView {
            phase: self.phase,
            identity: self.identity.clone(),
            seconds_until_expiry: self.seconds_until_expiry(now),
            remember_me: self.remember_me,
            last_error: self.last_error.clone(),
        }
    }
}

/// Whether a refresh token is still worth presenting to the transport.
///
/// With a tracked expiry (remembered sessions) the stamp decides. Without
/// one, a token that decodes as a JWT is judged by its own `exp` claim;
/// opaque tokens are assumed usable and the transport is the arbiter.
pub(crate) fn refresh_token_usable(
    refresh_token: Option<&str>,
    refresh_expiry_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let Some(tok) = refresh_token else {
        return false;
    };
    if let Some(expiry) = refresh_expiry_at {
        return expiry > now;
    }
    match token::decode(tok) {
        Ok(claims) if claims.expires_at().is_some() => claims.seconds_until_expiry(now) > 0,
        _ => true,
    }
}

/// What the UI layer reads: phase, identity, countdown, last error. The
/// coordinator republishes this on every transition and on the countdown
/// timer; rendering decisions (spinners, redirects) stay with the UI.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub identity: Option<Identity>,
    /// Remaining access-token life in seconds; negative once expired,
    /// absent when no session exists.
    pub seconds_until_expiry: Option<i64>,
    pub remember_me: bool,
    pub last_error: Option<SessionError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::test_tokens::token_for;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn expiry_arithmetic() {
        let state = SessionState {
            access_expiry_at: Some(at(1_000_500)),
            ..Default::default()
        };
        assert_eq!(state.seconds_until_expiry(at(1_000_000)), Some(500));
        assert!(!state.access_expired(at(1_000_000)));
        assert!(state.access_expired(at(1_000_500)));
        assert!(state.access_expired(at(1_000_501)));

        let bare = SessionState::default();
        assert_eq!(bare.seconds_until_expiry(at(0)), None);
        assert!(bare.access_expired(at(0)));
    }

    #[test]
    fn refresh_usability_prefers_tracked_expiry() {
        let now = at(1_000_000);
        assert!(!refresh_token_usable(None, None, now));
        assert!(refresh_token_usable(Some("opaque"), Some(at(1_000_001)), now));
        assert!(!refresh_token_usable(Some("opaque"), Some(at(1_000_000)), now));
    }

    #[test]
    fn refresh_usability_consults_jwt_expiry_when_untracked() {
        let now = at(1_000_000);
        let live = token_for("u", 1_000_100, &["member"]);
        let dead = token_for("u", 999_900, &["member"]);
        assert!(refresh_token_usable(Some(&live), None, now));
        assert!(!refresh_token_usable(Some(&dead), None, now));
        // Opaque tokens are assumed usable.
        assert!(refresh_token_usable(Some("not-a-jwt"), None, now));
    }
}
