/// Factory: build `AuthFilter` from application `Config`.
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::services::auth::allow_list::AllowList;
use crate::services::auth::filter::AuthFilter;
use crate::services::auth::identity::{CachedIdentityStore, IdentityStore};
use crate::services::auth::token::{SigningKey, TokenVerifier};
use crate::services::cache::{MemoryClient, ValkeyClient};

pub async fn build_auth_filter(config: &Config) -> Result<Arc<AuthFilter>> {
    let key = SigningKey::from_base64(&config.jwt_secret_key)
        .context("invalid configuration: JWT_SECRET_KEY")?;
    tracing::info!(key_len = key.len(), "jwt signing secret decoded");

    let identities = build_identity_store(config).await?;

    let filter = AuthFilter::new(
        AllowList::new(config.allow_list.iter().cloned()),
        TokenVerifier::new(&key),
        identities,
        config.user_lookup_policy,
    )
    .with_secret_key_bypass(config.secret_key_bypass);

    Ok(Arc::new(filter))
}

async fn build_identity_store(config: &Config) -> Result<Arc<dyn IdentityStore>> {
    match config.redis_url.as_deref() {
        Some(url) => {
            let client = ValkeyClient::new(url)
                .await
                .context("failed to connect to identity cache (REDIS_URL)")?;
            Ok(Arc::new(CachedIdentityStore::new(Arc::new(client))))
        }
        None => {
            if config.app_env.is_production() {
                anyhow::bail!("missing configuration: REDIS_URL");
            }
            tracing::warn!("REDIS_URL not set, using an empty in-memory identity cache");
            Ok(Arc::new(CachedIdentityStore::new(Arc::new(
                MemoryClient::new(),
            ))))
        }
    }
}
