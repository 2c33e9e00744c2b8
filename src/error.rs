use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid_json")]
    InvalidJson,

    #[error("{0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("token_expired")]
    TokenExpired,

    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("rate limited")]
    RateLimited,

    /// Soft client error with its own code (e.g. `no_history`).
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    /// Upstream or persistence failure, reported under an endpoint-specific code.
    #[error("{code}: {message}")]
    Failed {
        code: &'static str,
        status: StatusCode,
        message: String,
    },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// Wrap any error as a 500 under `code`.
    pub fn failed(code: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Failed {
            code,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidJson => "invalid_json",
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized => "unauthorized",
            AppError::TokenExpired => "token_expired",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::RateLimited => "rate_limited",
            AppError::BadRequest { code, .. } => code,
            AppError::Failed { code, .. } => code,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidJson | AppError::Validation(_) | AppError::BadRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized | AppError::TokenExpired => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Failed { status, .. } => *status,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            AppError::Validation(msg) => json!({ "error": code, "message": msg }),
            AppError::BadRequest { message, .. } => json!({ "error": code, "message": message }),
            AppError::Failed { message, .. } => {
                tracing::error!(code = code, error = %message, "Request failed");
                json!({ "error": code, "message": message })
            }
            AppError::TokenExpired => {
                json!({ "error": code, "message": "auth token expired, refresh and retry" })
            }
            _ => json!({ "error": code }),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
