use thiserror::Error;

/// Error taxonomy for the session lifecycle.
///
/// Structural token errors (`MalformedToken`, `IdentityExtraction`) are
/// always terminal and force a logout - retrying cannot repair a malformed
/// payload. `Network` is transient and retried exactly once during a
/// background refresh. `InvalidCredentials` is surfaced at login time
/// without touching the current session. `InvalidRefreshToken` is terminal.
///
/// `Clone`/`PartialEq` so the last error can live in observable state
/// snapshots and be asserted on in tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("identity extraction failed: {0}")]
    IdentityExtraction(String),

    #[error("network error during token exchange: {0}")]
    Network(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("refresh token invalid or expired")]
    InvalidRefreshToken,
}
