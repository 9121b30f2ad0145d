//! Shared types for the loyalty ledger
//!
//! Domain models, order-number validation and the caller-facing error
//! system used by the server and any surface built on top of it.

pub mod error;
pub mod models;
pub mod order_number;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCode};
pub use models::{AccrualStatus, Balance, Order, OrderStatus, Withdrawal};
