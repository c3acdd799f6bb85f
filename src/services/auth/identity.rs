use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{future::Future, pin::Pin, sync::Arc};

use crate::services::cache::{CacheClient, CacheError};

const USER_KEY_PREFIX: &str = "user";

/// Cached user record written by the account service under `user:<id>`.
///
/// Every field is optional, untyped, and unknown fields are ignored: the
/// gateway only needs to know the record exists. Only a value that is not a
/// JSON object fails to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub username: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub role: Option<Value>,
}

impl UserRecord {
    pub fn username(&self) -> Option<&str> {
        self.username.as_ref().and_then(Value::as_str)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("user record for key {key} is not valid JSON: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Lookup of known users by id.
///
/// Returns:
/// - Ok(Some(_)) => user is known
/// - Ok(None)    => no record (the caller applies `UserLookupPolicy`)
/// - Err(_)      => backend failure
pub trait IdentityStore: Send + Sync {
    fn find_user<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<UserRecord>, IdentityError>> + Send + 'a>>;

    // Backend name (for logging).
    fn backend_name(&self) -> &'static str;
}

/// Identity store backed by any [`CacheClient`].
#[derive(Clone, Debug)]
pub struct CachedIdentityStore<C: CacheClient> {
    cache: Arc<C>,
}

impl<C: CacheClient> CachedIdentityStore<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    pub fn key(&self, user_id: i64) -> String {
        format!("{}:{}", USER_KEY_PREFIX, user_id)
    }
}

impl<C: CacheClient> IdentityStore for CachedIdentityStore<C> {
    fn find_user<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<UserRecord>, IdentityError>> + Send + 'a>> {
        Box::pin(async move {
            let key = self.key(user_id);

            let Some(raw) = self.cache.get_string(&key).await? else {
                return Ok(None);
            };

            let record = serde_json::from_str::<UserRecord>(&raw)
                .map_err(|source| IdentityError::Decode { key, source })?;

            Ok(Some(record))
        })
    }

    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }
}
