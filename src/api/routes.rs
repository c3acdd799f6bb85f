/*
 * Responsibility
 * - gateway の URL 構造を定義
 * - /health は認証なし、それ以外は auth middleware → upstream proxy
 */
use axum::{Router, routing::get};

use crate::api::handlers::{health::health, proxy::proxy};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let gateway = Router::new().fallback(proxy);
    let gateway = middleware::auth::access::apply(gateway, state.clone()).with_state(state);

    Router::new()
        .route("/health", get(health))
        .fallback_service(gateway)
}
