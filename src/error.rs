use crate::coingecko::MarketError;
use crate::data::DataClientError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Every way a public API request can fail.
///
/// Client errors carry the message returned to the caller; server-side
/// failures are logged in full and answered with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    OutOfRange(&'static str),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    DataService(#[from] DataClientError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) | ApiError::Market(MarketError::CoinNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::OutOfRange(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Market(_) | ApiError::DataService(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_)
            | ApiError::PasswordHash(_)
            | ApiError::Token(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::OutOfRange(msg) => msg.to_string(),
            ApiError::Market(MarketError::CoinNotFound(id)) => format!("Crypto '{id}' not found"),
            ApiError::Market(_) => "Market data is currently unavailable".to_string(),
            ApiError::DataService(_) => "Portfolio storage is currently unavailable".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{} request failed: {}", status, self);
        }
        (status, self.public_message()).into_response()
    }
}
