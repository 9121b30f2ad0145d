//! Balance Model (derived, never persisted)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spendable points and lifetime withdrawals of one user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Balance {
    /// Accrued minus withdrawn
    pub current: Decimal,
    /// Sum of all withdrawals
    pub withdrawn: Decimal,
}

impl Balance {
    pub fn from_totals(accrued: Decimal, withdrawn: Decimal) -> Self {
        Self {
            current: accrued - withdrawn,
            withdrawn,
        }
    }

    /// A debit is allowed only when it is strictly below the current balance.
    pub fn covers(&self, amount: Decimal) -> bool {
        amount < self.current
    }
}
