/*
 * Responsibility
 * - gateway 自身が応答する route (/health) と、それ以外を upstream へ流す fallback
 */
pub mod handlers;
mod routes;

pub use routes::routes;
