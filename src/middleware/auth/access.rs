//! Gateway auth middleware: AuthFilter の判定 → identity header を付与して次へ
//!
//! - allow-list / `secretKey` bypass: request はそのまま
//! - token 検証成功: `X-User-Id` / `X-User-Roles` を上書きしてから次へ
//! - それ以外: `AppError` で短絡 (next は呼ばない)

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::AuthDecision;
use crate::services::auth::filter::attach_identity;
use crate::state::AppState;

/// Put the auth filter in front of every route (and the fallback) of `router`.
///
/// 例：
/// ```ignore
/// let gateway = Router::new().fallback(proxy);
/// let gateway = middleware::auth::access::apply(gateway, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path().to_owned();

    let decision = state.auth.authorize(&path, req.headers()).await?;

    if let AuthDecision::Authenticated(identity) = &decision {
        attach_identity(req.headers_mut(), identity)?;
    }

    Ok(next.run(req).await)
}
