/*
 * Responsibility
 * - gateway 共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - AuthError / UpstreamError を統一的に変換
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::AuthError;
use crate::services::upstream::UpstreamError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("malformed request")]
    MalformedRequest,
    #[error("request body could not be read")]
    InvalidRequestBody,
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid token claims")]
    InvalidClaims,
    #[error("unknown user")]
    UnknownUser,
    #[error("identity service unavailable")]
    IdentityUnavailable,
    #[error("bad gateway")]
    BadGateway,
    #[error("gateway timeout")]
    GatewayTimeout,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedRequest | AppError::InvalidRequestBody => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::TokenExpired
            | AppError::InvalidToken
            | AppError::InvalidClaims
            | AppError::UnknownUser => StatusCode::UNAUTHORIZED,
            AppError::IdentityUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadGateway => StatusCode::BAD_GATEWAY,
            AppError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::MalformedRequest => "MALFORMED_REQUEST",
            AppError::InvalidRequestBody => "INVALID_REQUEST_BODY",
            AppError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::InvalidClaims => "INVALID_CLAIMS",
            AppError::UnknownUser => "UNKNOWN_USER",
            AppError::IdentityUnavailable => "IDENTITY_UNAVAILABLE",
            AppError::BadGateway => "BAD_GATEWAY",
            AppError::GatewayTimeout => "GATEWAY_TIMEOUT",
            AppError::Internal => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MalformedRequest => AppError::MalformedRequest,
            AuthError::TokenExpired => AppError::TokenExpired,
            AuthError::InvalidToken => AppError::InvalidToken,
            AuthError::InvalidClaims(_) => AppError::InvalidClaims,
            AuthError::UnknownUser { .. } => AppError::UnknownUser,
            AuthError::IdentityUnavailable(_) => AppError::IdentityUnavailable,
        }
    }
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::Timeout => AppError::GatewayTimeout,
            UpstreamError::InvalidTarget(_) => AppError::Internal,
            // Client body problems are reported before we ever reach upstream
            UpstreamError::PayloadTooLarge { .. } => AppError::PayloadTooLarge,
            UpstreamError::RequestBody(_) => AppError::InvalidRequestBody,
            UpstreamError::Transport(_) | UpstreamError::ResponseBody(_) => AppError::BadGateway,
        }
    }
}
