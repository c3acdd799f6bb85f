/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - auth: AuthFilter (allow-list / signing key / identity store, 起動後は read-only)
 *   - upstream: 転送先 client
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::services::{auth::AuthFilter, upstream::UpstreamClient};

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<AuthFilter>,
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(auth: Arc<AuthFilter>, upstream: UpstreamClient) -> Self {
        Self { auth, upstream }
    }
}
