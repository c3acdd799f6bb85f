use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

/// In-process cache backend.
///
/// Used when no `REDIS_URL` is configured (local development) and in tests.
/// Entries live as long as the process; nothing expires.
#[derive(Clone, Debug, Default)]
pub struct MemoryClient {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) -> CacheResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::BackendCommand("memory cache lock poisoned".into()))?;
        entries.insert(key.into(), value.into());
        Ok(())
    }
}

#[async_trait]
impl CacheClient for MemoryClient {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::BackendCommand("memory cache lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }
}
