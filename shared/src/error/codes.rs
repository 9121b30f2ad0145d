//! Error codes reported by ledger operations
//!
//! - 0xxx: generic store outcomes
//! - 4xxx: order submission
//! - 5xxx: balance and withdrawals
//! - 9xxx: infrastructure

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    NotFound = 3,
    AlreadyExists = 4,
    /// The request conflicts with the stored state (e.g. a terminal order)
    InvalidRequest = 5,

    /// Order number fails the checksum
    InvalidOrderNumber = 4002,
    /// Order number was uploaded by another user
    OrderOwnedByOther = 4003,

    /// Not enough points for the withdrawal
    InsufficientBalance = 5001,
    /// Withdrawal amount is not positive
    InvalidAmount = 5002,
    /// A withdrawal already references this order
    WithdrawalExists = 5003,

    InternalError = 9001,
    DatabaseError = 9002,
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Default message, used when no specific one is given
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidOrderNumber => "Invalid order number",
            ErrorCode::OrderOwnedByOther => "Order number was already uploaded by another user",
            ErrorCode::InsufficientBalance => "Insufficient balance",
            ErrorCode::InvalidAmount => "Withdrawal amount must be positive",
            ErrorCode::WithdrawalExists => "A withdrawal for this order already exists",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
