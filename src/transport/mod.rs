//! Token exchange boundary.
//!
//! The coordinator never talks HTTP directly; it consumes this trait. The
//! crate ships [`HttpRefreshTransport`] for the real endpoints, and tests
//! substitute scripted implementations.

pub mod http;

pub use http::HttpRefreshTransport;

use async_trait::async_trait;
use thiserror::Error;

/// A freshly minted access/refresh token pair.
///
/// `refresh_token` is optional: some providers rotate it on every exchange,
/// others keep the original alive. When absent, the caller keeps using the
/// refresh token it already holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in_seconds: u64,
}

/// Failures at the token exchange boundary.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Login rejected the username/password pair.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The refresh token itself was rejected as invalid or expired.
    /// Terminal for the session holding it.
    #[error("refresh token rejected")]
    InvalidRefreshToken,

    /// Connectivity or server-side failure (timeouts, 5xx). Transient.
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with something unparseable. Treated as
    /// transient by the coordinator.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Exchanges credentials for token grants.
///
/// Request timeouts are this collaborator's responsibility; the coordinator
/// only sequences calls and interprets the error taxonomy.
#[async_trait]
pub trait RefreshTransport: Send + Sync + 'static {
    /// Trade a username/password pair for a token grant.
    async fn login(&self, username: &str, password: &str) -> Result<TokenGrant, TransportError>;

    /// Trade a refresh token for a new grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TransportError>;

    /// Invalidate a refresh token server-side. Best effort: callers log
    /// failures and never block logout on this.
    async fn revoke(&self, refresh_token: &str) -> Result<(), TransportError>;
}
