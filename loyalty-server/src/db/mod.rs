//! Database access layer
//!
//! Storage is reached through three traits: [`OrderStore`],
//! [`WithdrawalStore`] and [`Ledger`]. [`postgres::PgStore`] is the
//! production backend; [`memory::MemoryStore`] keeps everything in process.

pub mod memory;
pub mod orders;
pub mod postgres;
pub mod withdrawals;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{Balance, Order, OrderStatus, Withdrawal};

use crate::error::StoreResult;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of [`OrderStore::update_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The row changed
    Applied,
    /// The row already held exactly this status and accrual
    Unchanged,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order. Fails with `AlreadyExists` if the number is taken,
    /// whoever owns it.
    async fn create_order(&self, number: &str, owner: &str, status: OrderStatus)
    -> StoreResult<Order>;

    async fn get_order(&self, number: &str) -> StoreResult<Order>;

    /// Owner's orders, oldest upload first
    async fn list_orders(&self, owner: &str) -> StoreResult<Vec<Order>>;

    /// All non-terminal orders, oldest upload first
    async fn list_pending(&self) -> StoreResult<Vec<Order>>;

    /// Overwrite status and accrual of an existing order.
    ///
    /// Terminal orders are never moved; replaying the state an order already
    /// holds is a no-op reported as [`StatusUpdate::Unchanged`].
    async fn update_status(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> StoreResult<StatusUpdate>;
}

#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    /// Append a withdrawal row. Performs no balance check; see [`Ledger::debit`].
    async fn create_withdrawal(
        &self,
        order_reference: &str,
        owner: &str,
        amount: Decimal,
    ) -> StoreResult<Withdrawal>;

    /// Owner's withdrawals, oldest first
    async fn list_withdrawals(&self, owner: &str) -> StoreResult<Vec<Withdrawal>>;
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Derive `current` and `withdrawn` inside one read transaction.
    async fn balance(&self, owner: &str) -> StoreResult<Balance>;

    /// Atomically verify `amount < current` and append the withdrawal.
    async fn debit(
        &self,
        owner: &str,
        order_reference: &str,
        amount: Decimal,
    ) -> StoreResult<Withdrawal>;
}

/// Everything the server needs from a storage backend
pub trait LoyaltyStore: OrderStore + WithdrawalStore + Ledger {}

impl<T: OrderStore + WithdrawalStore + Ledger> LoyaltyStore for T {}

/// Accrual is stored only for `PROCESSED` orders; a processed order without
/// an amount earned nothing.
pub fn normalize_accrual(status: OrderStatus, accrual: Option<Decimal>) -> Option<Decimal> {
    match status {
        OrderStatus::Processed => Some(accrual.unwrap_or(Decimal::ZERO)),
        _ => None,
    }
}
