//! Per-request authentication decision.
//!
//! Order of checks:
//! 1. allow-listed path        -> bypass
//! 2. non-empty `secretKey`    -> bypass (operational override for internal callers)
//! 3. `Authorization: Bearer`  -> verify token, resolve identity, check the identity cache
//! 4. nothing usable           -> `AuthError::MalformedRequest`

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use tracing::{debug, error, info, warn};

use crate::config::UserLookupPolicy;
use crate::services::auth::allow_list::AllowList;
use crate::services::auth::error::AuthError;
use crate::services::auth::identity::IdentityStore;
use crate::services::auth::token::{Identity, TokenVerifier};

/// Override header for trusted internal callers (header names are case-insensitive).
pub const SECRET_KEY_HEADER: &str = "secretkey";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    AllowListedPath,
    SecretKeyOverride,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Forward the request untouched.
    Bypass(BypassReason),
    /// Forward with identity headers attached.
    Authenticated(Identity),
}

pub struct AuthFilter {
    allow_list: AllowList,
    verifier: TokenVerifier,
    identities: Arc<dyn IdentityStore>,
    lookup_policy: UserLookupPolicy,
    secret_key_bypass: bool,
}

impl std::fmt::Debug for AuthFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFilter")
            .field("allow_list", &self.allow_list)
            .field("verifier", &self.verifier)
            .field("identities", &self.identities.backend_name())
            .field("lookup_policy", &self.lookup_policy)
            .field("secret_key_bypass", &self.secret_key_bypass)
            .finish()
    }
}

impl AuthFilter {
    pub fn new(
        allow_list: AllowList,
        verifier: TokenVerifier,
        identities: Arc<dyn IdentityStore>,
        lookup_policy: UserLookupPolicy,
    ) -> Self {
        Self {
            allow_list,
            verifier,
            identities,
            lookup_policy,
            secret_key_bypass: true,
        }
    }

    /// Enable or disable the `secretKey` override header.
    pub fn with_secret_key_bypass(mut self, enabled: bool) -> Self {
        self.secret_key_bypass = enabled;
        self
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub async fn authorize(
        &self,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<AuthDecision, AuthError> {
        self.authorize_at(path, headers, chrono::Utc::now().timestamp())
            .await
    }

    /// Same as [`AuthFilter::authorize`] with an explicit clock (seconds since epoch).
    pub async fn authorize_at(
        &self,
        path: &str,
        headers: &HeaderMap,
        now: i64,
    ) -> Result<AuthDecision, AuthError> {
        if self.allow_list.contains(path) {
            info!(path = %path, "skipping auth for allow-listed path");
            return Ok(AuthDecision::Bypass(BypassReason::AllowListedPath));
        }

        if self.secret_key_bypass && has_secret_key(headers) {
            info!(path = %path, "secret key provided, skipping token validation");
            return Ok(AuthDecision::Bypass(BypassReason::SecretKeyOverride));
        }

        let Some(token) = bearer_token(headers) else {
            warn!(path = %path, "request without usable credentials");
            return Err(AuthError::MalformedRequest);
        };
        debug!(token_len = token.len(), "bearer token extracted");

        let identity = self.verifier.verify(token, now).map_err(|err| {
            warn!(path = %path, error = %err, "bearer token rejected");
            AuthError::from(err)
        })?;
        info!(
            user_id = identity.user_id,
            role = %identity.role,
            "token claims resolved"
        );

        self.check_known_user(identity.user_id).await?;

        Ok(AuthDecision::Authenticated(identity))
    }

    async fn check_known_user(&self, user_id: i64) -> Result<(), AuthError> {
        let fail_closed = self.lookup_policy == UserLookupPolicy::FailClosed;

        match self.identities.find_user(user_id).await {
            Ok(Some(record)) => {
                info!(
                    user_id,
                    username = ?record.username(),
                    "user record found"
                );
                Ok(())
            }
            Ok(None) if fail_closed => {
                warn!(user_id, "no user record found, rejecting");
                Err(AuthError::UnknownUser { user_id })
            }
            Ok(None) => {
                warn!(user_id, "no user record found, forwarding anyway");
                Ok(())
            }
            Err(err) if fail_closed => {
                error!(
                    user_id,
                    backend = self.identities.backend_name(),
                    error = %err,
                    "identity lookup failed, rejecting"
                );
                Err(AuthError::IdentityUnavailable(err))
            }
            Err(err) => {
                error!(
                    user_id,
                    backend = self.identities.backend_name(),
                    error = %err,
                    "identity lookup failed, forwarding anyway"
                );
                Ok(())
            }
        }
    }
}

fn has_secret_key(headers: &HeaderMap) -> bool {
    headers
        .get(SECRET_KEY_HEADER)
        .is_some_and(|v| !v.as_bytes().is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Insert (or overwrite) `X-User-Id` and `X-User-Roles`. No other header is touched.
pub fn attach_identity(headers: &mut HeaderMap, identity: &Identity) -> Result<(), AuthError> {
    let roles =
        HeaderValue::from_str(&identity.role).map_err(|_| AuthError::InvalidClaims("role"))?;

    headers.insert(
        HeaderName::from_static(USER_ID_HEADER),
        HeaderValue::from(identity.user_id),
    );
    headers.insert(HeaderName::from_static(USER_ROLES_HEADER), roles);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::identity::{CachedIdentityStore, IdentityError, UserRecord};
    use crate::services::auth::token::SigningKey;
    use crate::services::cache::{CacheError, MemoryClient};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;
    use std::{future::Future, pin::Pin};

    const SECRET: &[u8] = b"filter-tests-secret-0123456789abcdef";
    const NOW: i64 = 1_700_000_000;

    struct BrokenStore;

    impl IdentityStore for BrokenStore {
        fn find_user<'a>(
            &'a self,
            _user_id: i64,
        ) -> Pin<Box<dyn Future<Output = Result<Option<UserRecord>, IdentityError>> + Send + 'a>>
        {
            Box::pin(async {
                Err(IdentityError::Cache(CacheError::BackendConnection(
                    "connection refused".into(),
                )))
            })
        }

        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    fn filter_with(store: Arc<dyn IdentityStore>, policy: UserLookupPolicy) -> AuthFilter {
        let key = SigningKey::from_base64(&STANDARD.encode(SECRET)).unwrap();
        AuthFilter::new(AllowList::default(), TokenVerifier::new(&key), store, policy)
    }

    fn filter(policy: UserLookupPolicy) -> AuthFilter {
        let cache = MemoryClient::new();
        cache.insert("user:42", r#"{"id":42}"#).unwrap();
        filter_with(Arc::new(CachedIdentityStore::new(Arc::new(cache))), policy)
    }

    fn token(id: i64, exp: i64) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            &json!({"id": id, "role": "ADMIN", "exp": exp}),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[tokio::test]
    async fn allow_listed_paths_bypass_regardless_of_headers() {
        let f = filter(UserLookupPolicy::FailClosed);
        let junk = headers(&[("authorization", "Bearer junk")]);

        for path in f.allow_list().paths().to_vec() {
            let decision = f.authorize_at(&path, &junk, NOW).await.unwrap();
            assert_eq!(decision, AuthDecision::Bypass(BypassReason::AllowListedPath));
        }
    }

    #[tokio::test]
    async fn secret_key_header_bypasses_token_checks() {
        let f = filter(UserLookupPolicy::FailClosed);
        let h = headers(&[("secretkey", "internal"), ("authorization", "Bearer junk")]);

        let decision = f.authorize_at("/orders", &h, NOW).await.unwrap();
        assert_eq!(decision, AuthDecision::Bypass(BypassReason::SecretKeyOverride));
    }

    #[tokio::test]
    async fn empty_secret_key_header_is_ignored() {
        let f = filter(UserLookupPolicy::FailClosed);
        let h = headers(&[("secretkey", "")]);

        let err = f.authorize_at("/orders", &h, NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedRequest));
    }

    #[tokio::test]
    async fn disabled_override_falls_through_to_token_checks() {
        let f = filter(UserLookupPolicy::FailClosed).with_secret_key_bypass(false);
        let h = headers(&[("secretkey", "internal")]);

        let err = f.authorize_at("/orders", &h, NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedRequest));
    }

    #[tokio::test]
    async fn valid_token_resolves_identity() {
        let f = filter(UserLookupPolicy::FailClosed);
        let h = headers(&[("authorization", format!("Bearer {}", token(42, NOW + 600)).as_str())]);

        let decision = f.authorize_at("/orders", &h, NOW).await.unwrap();
        assert_eq!(
            decision,
            AuthDecision::Authenticated(Identity {
                user_id: 42,
                role: "ADMIN".into()
            })
        );
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let f = filter(UserLookupPolicy::FailClosed);
        let h = headers(&[("authorization", format!("Bearer {}", token(42, NOW - 1)).as_str())]);

        let err = f.authorize_at("/orders", &h, NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn non_bearer_authorization_is_malformed() {
        let f = filter(UserLookupPolicy::FailClosed);
        for value in ["Basic dXNlcjpwYXNz", "bearer abc", "Bearer"] {
            let h = headers(&[("authorization", value)]);
            let err = f.authorize_at("/orders", &h, NOW).await.unwrap_err();
            assert!(matches!(err, AuthError::MalformedRequest), "{value}");
        }
    }

    #[tokio::test]
    async fn unknown_user_depends_on_policy() {
        let h = headers(&[("authorization", format!("Bearer {}", token(7, NOW + 600)).as_str())]);

        let err = filter(UserLookupPolicy::FailClosed)
            .authorize_at("/orders", &h, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser { user_id: 7 }));

        let decision = filter(UserLookupPolicy::FailOpen)
            .authorize_at("/orders", &h, NOW)
            .await
            .unwrap();
        assert!(matches!(decision, AuthDecision::Authenticated(ref i) if i.user_id == 7));
    }

    #[tokio::test]
    async fn backend_failure_depends_on_policy() {
        let h = headers(&[("authorization", format!("Bearer {}", token(42, NOW + 600)).as_str())]);

        let err = filter_with(Arc::new(BrokenStore), UserLookupPolicy::FailClosed)
            .authorize_at("/orders", &h, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::IdentityUnavailable(_)));

        let decision = filter_with(Arc::new(BrokenStore), UserLookupPolicy::FailOpen)
            .authorize_at("/orders", &h, NOW)
            .await
            .unwrap();
        assert!(matches!(decision, AuthDecision::Authenticated(_)));
    }

    #[test]
    fn attach_identity_overwrites_only_identity_headers() {
        let mut h = headers(&[
            ("x-user-id", "999"),
            ("x-user-roles", "ROOT"),
            ("accept", "application/json"),
        ]);
        let identity = Identity {
            user_id: 42,
            role: "ADMIN".into(),
        };

        attach_identity(&mut h, &identity).unwrap();

        assert_eq!(h.len(), 3);
        assert_eq!(h.get("x-user-id").unwrap(), "42");
        assert_eq!(h.get("x-user-roles").unwrap(), "ADMIN");
        assert_eq!(h.get("accept").unwrap(), "application/json");
    }
}
