//! Withdrawal Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Points debited from a user's balance (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Withdrawal {
    /// Order the debit is billed against; need not exist in the order table
    #[serde(rename = "order")]
    pub order_reference: String,
    #[serde(skip_serializing)]
    pub owner: String,
    /// Debited points, always positive
    #[serde(rename = "sum")]
    pub amount: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// Withdraw request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Decimal,
}
