//! API gateway authentication filter.
//!
//! Every request not served by the gateway itself passes through
//! [`services::auth::AuthFilter`] and, if allowed, is proxied to one upstream
//! with `X-User-Id` / `X-User-Roles` describing the caller.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
