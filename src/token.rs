//! Token inspection: claim decoding and derived facts.
//!
//! Tokens are treated as bearer JWTs whose payload we decode **without**
//! verifying the cryptographic signature - signature trust is delegated to
//! the issuing authority, which hands tokens to this client over TLS. The
//! inspector only answers structural questions: is the payload parseable,
//! when does it expire, who is the subject, which roles does it carry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::SessionError;

/// Identity derived from access-token claims.
///
/// Always re-derived from the current access token, never mutated
/// independently, so displayed identity cannot drift from token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable subject identifier (`sub` claim).
    pub subject: String,
    /// Role claims gating UI and API access.
    pub roles: Vec<String>,
    /// Human-readable name, when the provider supplies one.
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Decoded token payload.
#[derive(Debug, Clone)]
pub struct Claims {
    raw: JsonValue,
}

/// Decode the payload of a compact JWS token (three dot-separated,
/// base64url-encoded segments). The signature segment is ignored.
pub fn decode(token: &str) -> Result<Claims, SessionError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SessionError::MalformedToken(
            "expected three dot-separated segments".into(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| SessionError::MalformedToken(format!("payload base64: {e}")))?;
    let raw: JsonValue = serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::MalformedToken(format!("payload json: {e}")))?;

    if !raw.is_object() {
        return Err(SessionError::MalformedToken(
            "payload is not a json object".into(),
        ));
    }

    Ok(Claims { raw })
}

/// True iff the token decodes and its payload carries an expiry claim.
pub fn is_structurally_valid(token: &str) -> bool {
    decode(token).map(|c| c.expires_at().is_some()).unwrap_or(false)
}

impl Claims {
    /// Expiry as seconds since the Unix epoch, when present.
    pub fn expires_at(&self) -> Option<i64> {
        self.raw.get("exp").and_then(JsonValue::as_i64)
    }

    /// Expiry as a UTC instant, when present and representable.
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at().and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Seconds from `now` until expiry. Negative once expired. A payload
    /// with no expiry claim behaves as long-expired; callers gate on
    /// [`is_structurally_valid`] before trusting the token at all.
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.expires_at().unwrap_or(0) - now.timestamp()
    }

    pub fn subject(&self) -> Option<&str> {
        self.raw.get("sub").and_then(JsonValue::as_str)
    }

    /// Role claims. Accepts a top-level `roles` array or the Keycloak-style
    /// `realm_access.roles` nesting. `None` when neither claim exists;
    /// `Some(Err)` semantics are folded into `extract_identity`.
    fn roles_claim(&self) -> Option<&JsonValue> {
        self.raw.get("roles").or_else(|| {
            self.raw
                .get("realm_access")
                .and_then(|ra| ra.get("roles"))
        })
    }

    fn display_name(&self) -> Option<String> {
        self.raw
            .get("name")
            .or_else(|| self.raw.get("preferred_username"))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    }

    fn email(&self) -> Option<String> {
        self.raw.get("email").and_then(JsonValue::as_str).map(str::to_string)
    }
}

/// Map provider claims onto the application identity shape.
///
/// Fails loudly rather than returning partial data: role-gated UI depends on
/// trustworthy roles, so a missing subject or a missing/misshapen roles
/// claim is an error, never an empty default.
pub fn extract_identity(claims: &Claims) -> Result<Identity, SessionError> {
    let subject = claims
        .subject()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SessionError::IdentityExtraction("missing sub claim".into()))?
        .to_string();

    let roles_value = claims
        .roles_claim()
        .ok_or_else(|| SessionError::IdentityExtraction("missing roles claim".into()))?;
    let roles = roles_value
        .as_array()
        .ok_or_else(|| SessionError::IdentityExtraction("roles claim is not an array".into()))?
        .iter()
        .map(|r| {
            r.as_str()
                .map(str::to_string)
                .ok_or_else(|| SessionError::IdentityExtraction("non-string role entry".into()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Identity {
        subject,
        roles,
        display_name: claims.display_name(),
        email: claims.email(),
    })
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    /// Build an unsigned test token with the given payload json.
    pub fn token_with_payload(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
        format!("{header}.{body}.sig")
    }

    /// A well-formed token for `sub` expiring at `exp` (epoch seconds).
    pub fn token_for(sub: &str, exp: i64, roles: &[&str]) -> String {
        token_with_payload(&serde_json::json!({
            "sub": sub,
            "exp": exp,
            "roles": roles,
            "name": "Test User",
            "email": format!("{sub}@example.org"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::test_tokens::{token_for, token_with_payload};
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode("not-a-token"),
            Err(SessionError::MalformedToken(_))
        ));
        assert!(matches!(
            decode("a.b"),
            Err(SessionError::MalformedToken(_))
        ));
        assert!(matches!(
            decode("a.!!!.c"),
            Err(SessionError::MalformedToken(_))
        ));
    }

    #[test]
    fn structural_validity_requires_expiry() {
        let with_exp = token_for("u1", 2_000_000_000, &["member"]);
        assert!(is_structurally_valid(&with_exp));

        let without_exp = token_with_payload(&serde_json::json!({ "sub": "u1" }));
        assert!(!is_structurally_valid(&without_exp));
        assert!(!is_structurally_valid("junk"));
    }

    #[test]
    fn seconds_until_expiry_decreases_and_signs_expiry() {
        let exp = 1_700_000_000;
        let token = token_for("u1", exp, &["member"]);
        let claims = decode(&token).unwrap();

        let before = Utc.timestamp_opt(exp - 600, 0).unwrap();
        let later = Utc.timestamp_opt(exp - 10, 0).unwrap();
        let at = Utc.timestamp_opt(exp, 0).unwrap();
        let after = Utc.timestamp_opt(exp + 30, 0).unwrap();

        assert_eq!(claims.seconds_until_expiry(before), 600);
        assert!(claims.seconds_until_expiry(before) > claims.seconds_until_expiry(later));
        assert_eq!(claims.seconds_until_expiry(at), 0);
        assert!(claims.seconds_until_expiry(after) < 0);
    }

    #[test]
    fn extract_identity_maps_claims() {
        let token = token_for("user-42", 2_000_000_000, &["member", "moderator"]);
        let identity = extract_identity(&decode(&token).unwrap()).unwrap();
        assert_eq!(identity.subject, "user-42");
        assert_eq!(identity.roles, vec!["member", "moderator"]);
        assert_eq!(identity.display_name.as_deref(), Some("Test User"));
        assert_eq!(identity.email.as_deref(), Some("user-42@example.org"));
    }

    #[test]
    fn extract_identity_accepts_realm_access_roles() {
        let token = token_with_payload(&serde_json::json!({
            "sub": "user-7",
            "exp": 2_000_000_000i64,
            "realm_access": { "roles": ["admin"] },
        }));
        let identity = extract_identity(&decode(&token).unwrap()).unwrap();
        assert_eq!(identity.roles, vec!["admin"]);
        assert_eq!(identity.display_name, None);
    }

    #[test]
    fn extract_identity_fails_loudly_on_partial_claims() {
        let no_sub = token_with_payload(&serde_json::json!({
            "exp": 2_000_000_000i64,
            "roles": ["member"],
        }));
        assert!(matches!(
            extract_identity(&decode(&no_sub).unwrap()),
            Err(SessionError::IdentityExtraction(_))
        ));

        let no_roles = token_with_payload(&serde_json::json!({
            "sub": "u1",
            "exp": 2_000_000_000i64,
        }));
        assert!(matches!(
            extract_identity(&decode(&no_roles).unwrap()),
            Err(SessionError::IdentityExtraction(_))
        ));

        let bad_roles = token_with_payload(&serde_json::json!({
            "sub": "u1",
            "exp": 2_000_000_000i64,
            "roles": "member",
        }));
        assert!(matches!(
            extract_identity(&decode(&bad_roles).unwrap()),
            Err(SessionError::IdentityExtraction(_))
        ));
    }
}
