/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: token 検証 → identity header 付与
 * - http: request-id / trace / body limit / timeout
 */
pub mod auth;
pub mod http;
