pub mod allow_list;
pub mod error;
pub mod factory;
pub mod filter;
pub mod identity;
pub mod token;

pub use error::AuthError;
pub use factory::build_auth_filter;
pub use filter::{AuthDecision, AuthFilter, BypassReason};
pub use token::{Identity, TokenVerifier};
