//! Caller-facing errors for the loyalty ledger
//!
//! - [`ErrorCode`]: numeric codes grouped by range
//! - [`AppError`]: code, message and optional details
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::new(ErrorCode::InsufficientBalance);
//! assert_eq!(err.http_status(), shared::http::StatusCode::PAYMENT_REQUIRED);
//!
//! let err = AppError::invalid_order_number("12345");
//! assert_eq!(err.code.code(), 4002);
//! ```

mod codes;
mod http;
mod types;

pub use codes::ErrorCode;
pub use types::{AppError, AppResult};
