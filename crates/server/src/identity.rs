//! Working out who is voting.
//!
//! A valid Supabase session token identifies a user. Everyone else is known
//! only by the network address the request came from, which is easy to spoof
//! behind a misconfigured proxy.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use supabase_jwt::{Claims, JwksCache};
use tracing::debug;

use crate::models::VoterIdentity;

pub const FALLBACK_ADDRESS: &str = "127.0.0.1";

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Returns the user id the token was issued to, or `None` if the token is
    /// not valid.
    async fn verify(&self, token: &str) -> Option<String>;
}

pub struct SupabaseVerifier {
    jwks_cache: Arc<JwksCache>,
}

impl SupabaseVerifier {
    pub fn new(supabase_url: &str) -> Self {
        let jwks_url = format!(
            "{}/auth/v1/.well-known/jwks.json",
            supabase_url.trim_end_matches('/')
        );
        Self {
            jwks_cache: Arc::new(JwksCache::new(&jwks_url)),
        }
    }
}

fn is_expired(exp: i64) -> bool {
    Utc::now().timestamp() > exp
}

#[async_trait]
impl TokenVerifier for SupabaseVerifier {
    async fn verify(&self, token: &str) -> Option<String> {
        match Claims::from_token(token, &self.jwks_cache).await {
            Ok(claims) if is_expired(claims.exp as i64) => {
                debug!("expired session token, treating caller as anonymous");
                None
            }
            Ok(claims) => Some(claims.sub),
            Err(_) => {
                debug!("invalid session token, treating caller as anonymous");
                None
            }
        }
    }
}

/// Used when no auth provider is configured: every caller is anonymous.
pub struct AnonymousOnly;

#[async_trait]
impl TokenVerifier for AnonymousOnly {
    async fn verify(&self, _token: &str) -> Option<String> {
        None
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Client address as reported by the proxy in front of us. The first hop of
/// `X-Forwarded-For` is the original client.
pub fn network_address(headers: &HeaderMap) -> String {
    header_value(headers, "x-forwarded-for")
        .and_then(|list| list.split(',').map(str::trim).find(|hop| !hop.is_empty()))
        .or_else(|| header_value(headers, "x-real-ip"))
        .unwrap_or(FALLBACK_ADDRESS)
        .to_string()
}

/// The signed-in user if the request carries a valid token, else the caller's
/// network address.
pub async fn resolve(verifier: &dyn TokenVerifier, headers: &HeaderMap) -> VoterIdentity {
    if let Some(token) = bearer_token(headers) {
        if let Some(user_id) = verifier.verify(token).await {
            return VoterIdentity::User(user_id);
        }
    }
    VoterIdentity::Address(network_address(headers))
}

/// Only the signed-in user, for operations that need an owner.
pub async fn resolve_user(verifier: &dyn TokenVerifier, headers: &HeaderMap) -> Option<String> {
    let token = bearer_token(headers)?;
    verifier.verify(token).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    struct OneToken;

    #[async_trait]
    impl TokenVerifier for OneToken {
        async fn verify(&self, token: &str) -> Option<String> {
            (token == "good").then(|| "u1".to_string())
        }
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[tokio::test]
    async fn valid_token_wins_over_address() {
        let h = headers(&[("authorization", "Bearer good"), ("x-forwarded-for", "10.0.0.5")]);
        assert_eq!(resolve(&OneToken, &h).await, VoterIdentity::User("u1".into()));
    }

    #[tokio::test]
    async fn invalid_token_falls_back_to_address() {
        let h = headers(&[("authorization", "Bearer bad"), ("x-forwarded-for", "10.0.0.5")]);
        assert_eq!(resolve(&OneToken, &h).await, VoterIdentity::Address("10.0.0.5".into()));
        assert_eq!(resolve_user(&OneToken, &h).await, None);
    }

    #[test]
    fn forwarded_for_is_preferred_and_first_hop_used() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "10.0.0.9"),
        ]);
        assert_eq!(network_address(&h), "203.0.113.7");
    }

    #[test]
    fn real_ip_then_loopback() {
        assert_eq!(network_address(&headers(&[("x-real-ip", "10.0.0.9")])), "10.0.0.9");
        assert_eq!(network_address(&headers(&[("x-forwarded-for", " ")])), FALLBACK_ADDRESS);
        assert_eq!(network_address(&HeaderMap::new()), FALLBACK_ADDRESS);
    }

    #[tokio::test]
    async fn anonymous_only_never_identifies_users() {
        let h = headers(&[("authorization", "Bearer anything")]);
        assert_eq!(
            resolve(&AnonymousOnly, &h).await,
            VoterIdentity::Address(FALLBACK_ADDRESS.into())
        );
    }
}
