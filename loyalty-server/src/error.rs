//! Storage-layer error type and its bridge to the caller-facing `AppError`
//!
//! `StoreError` carries both expected ledger outcomes (`NotFound`,
//! `AlreadyExists`, `InsufficientBalance`) and infrastructure failures.
//! Converting into `AppError` logs infrastructure failures once and passes
//! business outcomes through untouched.

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::OrderStatus;

/// SQLSTATE for `serialization_failure`
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for `deadlock_detected`
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("order {number} is already {status}")]
    TerminalState { number: String, status: OrderStatus },

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// True when the database aborted the transaction to preserve
    /// serializability; the whole transaction may be retried.
    pub fn is_serialization_failure(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => matches!(
                db.code().as_deref(),
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
            ),
            _ => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(resource) => AppError::not_found(resource),
            StoreError::AlreadyExists(resource) => AppError::already_exists(resource),
            StoreError::InsufficientBalance {
                requested,
                available,
            } => AppError::new(ErrorCode::InsufficientBalance)
                .with_detail("requested", requested.to_string())
                .with_detail("available", available.to_string()),
            StoreError::InvalidAmount(amount) => {
                AppError::new(ErrorCode::InvalidAmount).with_detail("sum", amount.to_string())
            }
            StoreError::TerminalState { number, status } => AppError::with_message(
                ErrorCode::InvalidRequest,
                format!("order {number} is already {status}"),
            ),
            StoreError::Corrupt(msg) => {
                tracing::error!(error = %msg, "Corrupt row in store");
                AppError::new(ErrorCode::InternalError)
            }
            StoreError::Database(db_err) => {
                tracing::error!(error = %db_err, "Store database error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}
