use thiserror::Error;

use crate::services::auth::identity::IdentityError;
use crate::services::auth::token::TokenError;

/// Why the auth filter refused a request.
///
/// Mapped to an HTTP response in `crate::error`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request carries no usable credentials")]
    MalformedRequest,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid '{0}' claim")]
    InvalidClaims(&'static str),

    #[error("user {user_id} is not known")]
    UnknownUser { user_id: i64 },

    #[error("identity lookup failed")]
    IdentityUnavailable(#[source] IdentityError),
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Jwt(_) | TokenError::NotYetValid { .. } => AuthError::InvalidToken,
            TokenError::Expired { .. } => AuthError::TokenExpired,
            TokenError::MissingClaim(name) | TokenError::InvalidClaim(name) => {
                AuthError::InvalidClaims(name)
            }
        }
    }
}
