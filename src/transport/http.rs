//! HTTP implementation of the token exchange boundary.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RefreshTransport, TokenGrant, TransportError};

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough that a scheduled
/// refresh settles well before the next timer tick.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: u64,
}

impl From<GrantResponse> for TokenGrant {
    fn from(g: GrantResponse) -> Self {
        TokenGrant {
            access_token: g.access_token,
            refresh_token: g.refresh_token,
            expires_in_seconds: g.expires_in,
        }
    }
}

/// Token exchange client for the auth endpoints.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling.
#[derive(Clone)]
pub struct HttpRefreshTransport {
    client: Client,
    base_url: String,
}

impl HttpRefreshTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success status onto the taxonomy. `rejection` is the
    /// variant for a 4xx that names the presented credential as bad.
    async fn check_response(
        response: Response,
        rejection: fn() -> TransportError,
    ) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = %status, "Token endpoint rejected request");
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(rejection())
            }
            s if s.is_server_error() => {
                Err(TransportError::Network(format!("server error {s}: {body}")))
            }
            s => Err(TransportError::InvalidResponse(format!("status {s}: {body}"))),
        }
    }

    async fn parse_grant(response: Response) -> Result<TokenGrant, TransportError> {
        let grant: GrantResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        Ok(grant.into())
    }

    fn send_error(e: reqwest::Error) -> TransportError {
        TransportError::Network(e.to_string())
    }
}

#[async_trait]
impl RefreshTransport for HttpRefreshTransport {
    async fn login(&self, username: &str, password: &str) -> Result<TokenGrant, TransportError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(Self::send_error)?;
        let response =
            Self::check_response(response, || TransportError::InvalidCredentials).await?;
        Self::parse_grant(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TransportError> {
        let response = self
            .client
            .post(self.url("/auth/token"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(Self::send_error)?;
        let response =
            Self::check_response(response, || TransportError::InvalidRefreshToken).await?;
        Self::parse_grant(response).await
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.url("/auth/revoke"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(Self::send_error)?;
        Self::check_response(response, || TransportError::InvalidRefreshToken).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_response_parses_camel_case() {
        let json = r#"{"accessToken":"a.b.c","refreshToken":"r1","expiresIn":900}"#;
        let grant: TokenGrant = serde_json::from_str::<GrantResponse>(json).unwrap().into();
        assert_eq!(grant.access_token, "a.b.c");
        assert_eq!(grant.refresh_token.as_deref(), Some("r1"));
        assert_eq!(grant.expires_in_seconds, 900);
    }

    #[test]
    fn grant_response_tolerates_missing_refresh_token() {
        let json = r#"{"accessToken":"a.b.c","expiresIn":900}"#;
        let grant: TokenGrant = serde_json::from_str::<GrantResponse>(json).unwrap().into();
        assert_eq!(grant.refresh_token, None);
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let transport = HttpRefreshTransport::new("https://auth.example.org/").unwrap();
        assert_eq!(transport.url("/auth/login"), "https://auth.example.org/auth/login");
    }
}
