//! Session verification
//!
//! The identity provider hands out HMAC-SHA256 signed tokens of the form
//! `hex(json claims) "." hex(mac)`. This service only verifies them; the
//! `token` CLI subcommand can mint one for local use.

use crate::api::state::AppState;
use crate::error::{Result, StackShareError};
use crate::types::UserId;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::convert::Infallible;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Signed session payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiry, unix seconds
    pub exp: i64,
}

/// Issues and verifies session tokens with a shared secret
#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| StackShareError::Other(format!("Invalid HMAC key: {}", e)))?;
        mac.update(payload);
        Ok(mac)
    }

    /// Mint a token for `user` valid for `ttl` from `now`
    pub fn issue(
        &self,
        user: UserId,
        email: Option<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let claims = SessionClaims {
            sub: user,
            email,
            exp: (now + ttl).timestamp(),
        };
        let payload = serde_json::to_vec(&claims)?;
        let signature = self.mac(&payload)?.finalize().into_bytes();
        Ok(format!("{}.{}", hex::encode(&payload), hex::encode(signature)))
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims> {
        let invalid = || StackShareError::Unauthorized("Invalid session".to_string());

        let (payload_hex, signature_hex) = token.trim().split_once('.').ok_or_else(invalid)?;
        let payload = hex::decode(payload_hex).map_err(|_| invalid())?;
        let signature = hex::decode(signature_hex).map_err(|_| invalid())?;

        self.mac(&payload)?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        let claims: SessionClaims = serde_json::from_slice(&payload).map_err(|_| invalid())?;
        if claims.exp <= now.timestamp() {
            return Err(StackShareError::Unauthorized("Session expired".to_string()));
        }

        Ok(claims)
    }
}

/// Token from `Authorization: Bearer` or the session cookie
pub fn token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value carrying a session
pub fn session_cookie(name: &str, token: &str, max_age: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name,
        token,
        max_age.num_seconds().max(0)
    )
}

/// `Set-Cookie` value removing the session
pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}

/// Signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Option<String>,
}

impl From<SessionClaims> for CurrentUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
        }
    }
}

/// Resolve the session of a request; invalid or expired tokens count as none
pub fn session_user(state: &AppState, headers: &HeaderMap) -> Option<CurrentUser> {
    let token = token_from_headers(headers, &state.config.auth.cookie_name)?;
    match state.signer.verify(&token, Utc::now()) {
        Ok(claims) => Some(claims.into()),
        Err(e) => {
            debug!("Ignoring session token: {}", e);
            None
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = StackShareError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        session_user(state, &parts.headers)
            .ok_or_else(|| StackShareError::Unauthorized("Sign in required".to_string()))
    }
}

/// Session if present (anonymous viewers allowed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Infallible> {
        Ok(MaybeUser(session_user(state, &parts.headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn signer() -> SessionSigner {
        SessionSigner::new("0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn test_issue_then_verify() {
        let user = UserId::new();
        let now = Utc::now();
        let token = signer()
            .issue(user, Some("ada@example.com".to_string()), Duration::hours(1), now)
            .unwrap();

        let claims = signer().verify(&token, now).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = Utc::now();
        let token = signer()
            .issue(UserId::new(), None, Duration::hours(1), now)
            .unwrap();
        let later = now + Duration::hours(2);
        assert!(matches!(
            signer().verify(&token, later),
            Err(StackShareError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let now = Utc::now();
        let token = signer()
            .issue(UserId::new(), None, Duration::hours(1), now)
            .unwrap();

        let other = SessionSigner::new("another-secret-another-secret-123");
        assert!(other.verify(&token, now).is_err());

        let (payload, sig) = token.split_once('.').unwrap();
        let forged_claims = SessionClaims {
            sub: UserId::new(),
            email: None,
            exp: now.timestamp() + 3600,
        };
        let forged = format!(
            "{}.{}",
            hex::encode(serde_json::to_vec(&forged_claims).unwrap()),
            sig
        );
        assert_ne!(payload, forged.split_once('.').unwrap().0);
        assert!(signer().verify(&forged, now).is_err());
        assert!(signer().verify("garbage", now).is_err());
    }

    #[test]
    fn test_token_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; stackshare-session=abc.def"),
        );
        assert_eq!(
            token_from_headers(&headers, "stackshare-session"),
            Some("abc.def".to_string())
        );

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz.123"));
        assert_eq!(
            token_from_headers(&headers, "stackshare-session"),
            Some("xyz.123".to_string())
        );

        assert_eq!(token_from_headers(&HeaderMap::new(), "stackshare-session"), None);
    }

    #[test]
    fn test_cookie_strings() {
        let set = session_cookie("stackshare-session", "t", Duration::hours(1));
        assert!(set.starts_with("stackshare-session=t;"));
        assert!(set.contains("Max-Age=3600"));
        assert!(clear_session_cookie("stackshare-session").contains("Max-Age=0"));
    }
}
