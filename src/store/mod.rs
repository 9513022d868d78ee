//! Credential persistence shared by every coordinator instance of the same
//! user profile.
//!
//! The store is a plain string key/value surface: tokens, expiry stamps
//! (epoch millis) and the remember-me flag. Reads never fail - an absent or
//! corrupt key is indistinguishable from an empty one, so a damaged store
//! degrades toward logged-out rather than toward a false sense of
//! authentication.

pub mod file;
pub mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

pub const KEY_ACCESS_TOKEN: &str = "accessToken";
pub const KEY_REFRESH_TOKEN: &str = "refreshToken";
pub const KEY_ACCESS_EXPIRY: &str = "accessExpiryAt";
pub const KEY_REFRESH_EXPIRY: &str = "refreshExpiryAt";
pub const KEY_REMEMBER_ME: &str = "rememberMe";

/// Clear order: tokens before expiry stamps, so a concurrent reader in
/// another instance never observes an authenticated-looking partial state.
pub(crate) const CLEAR_ORDER: [&str; 5] = [
    KEY_ACCESS_TOKEN,
    KEY_REFRESH_TOKEN,
    KEY_ACCESS_EXPIRY,
    KEY_REFRESH_EXPIRY,
    KEY_REMEMBER_ME,
];

/// Snapshot of the persisted session keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub access_expiry_at: Option<DateTime<Utc>>,
    /// Only persisted for remembered sessions.
    pub refresh_expiry_at: Option<DateTime<Utc>>,
    pub remember_me: bool,
}

impl StoredCredentials {
    /// True when no credential material is present at all.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// Key/value pairs to persist. Absent values yield no pair, which the
    /// backends translate into key removal.
    pub(crate) fn to_pairs(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            (KEY_ACCESS_TOKEN, self.access_token.clone()),
            (KEY_REFRESH_TOKEN, self.refresh_token.clone()),
            (
                KEY_ACCESS_EXPIRY,
                self.access_expiry_at.map(|t| t.timestamp_millis().to_string()),
            ),
            (
                KEY_REFRESH_EXPIRY,
                self.refresh_expiry_at.map(|t| t.timestamp_millis().to_string()),
            ),
            (KEY_REMEMBER_ME, Some(self.remember_me.to_string())),
        ]
    }

    /// Rebuild a snapshot from a key lookup. Corrupt values are dropped
    /// per key rather than failing the whole read.
    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            access_token: get(KEY_ACCESS_TOKEN).filter(|s| !s.is_empty()),
            refresh_token: get(KEY_REFRESH_TOKEN).filter(|s| !s.is_empty()),
            access_expiry_at: get(KEY_ACCESS_EXPIRY).as_deref().and_then(parse_millis),
            refresh_expiry_at: get(KEY_REFRESH_EXPIRY).as_deref().and_then(parse_millis),
            remember_me: get(KEY_REMEMBER_ME).as_deref() == Some("true"),
        }
    }
}

fn parse_millis(raw: &str) -> Option<DateTime<Utc>> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

/// Persistent, instance-shared storage for the session keys.
///
/// Implementations must be shareable across coordinator instances of the
/// same user profile (the cross-instance consistency story relies on every
/// instance reading the same truth on re-initialize).
pub trait CredentialStore: Send + Sync + 'static {
    /// Persist a snapshot. All present keys are written, absent keys are
    /// removed.
    fn write(&self, creds: &StoredCredentials) -> Result<()>;

    /// Read the current snapshot. Never fails: absent or corrupt keys are
    /// treated as empty.
    fn read(&self) -> StoredCredentials;

    /// Remove all session keys, tokens first.
    fn clear(&self);
}
