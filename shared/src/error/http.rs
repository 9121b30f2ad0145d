//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,

            Self::AlreadyExists | Self::OrderOwnedByOther | Self::WithdrawalExists => {
                StatusCode::CONFLICT
            }

            Self::InvalidOrderNumber => StatusCode::UNPROCESSABLE_ENTITY,

            Self::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,

            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,

            Self::InvalidRequest | Self::InvalidAmount => StatusCode::BAD_REQUEST,
        }
    }
}
