//! In-process store
//!
//! Both tables sit behind one mutex, so every ledger operation is trivially
//! serializable. Used by tests and for running without Postgres.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use shared::models::{Balance, Order, OrderStatus, Withdrawal};
use std::collections::HashMap;

use super::{Ledger, OrderStore, StatusUpdate, WithdrawalStore, normalize_accrual};
use crate::error::{StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    /// Insertion order
    orders: Vec<Order>,
    /// number -> index into `orders`
    order_index: HashMap<String, usize>,
    withdrawals: Vec<Withdrawal>,
}

impl Tables {
    fn balance(&self, owner: &str) -> Balance {
        let accrued: Decimal = self
            .orders
            .iter()
            .filter(|o| o.owner == owner)
            .map(Order::credited)
            .sum();
        let withdrawn: Decimal = self
            .withdrawals
            .iter()
            .filter(|w| w.owner == owner)
            .map(|w| w.amount)
            .sum();
        Balance::from_totals(accrued, withdrawn)
    }

    fn insert_withdrawal(
        &mut self,
        order_reference: &str,
        owner: &str,
        amount: Decimal,
    ) -> StoreResult<Withdrawal> {
        if amount <= Decimal::ZERO {
            return Err(StoreError::InvalidAmount(amount));
        }
        if self
            .withdrawals
            .iter()
            .any(|w| w.order_reference == order_reference)
        {
            return Err(StoreError::AlreadyExists(format!(
                "withdrawal for order {order_reference}"
            )));
        }
        let withdrawal = Withdrawal {
            order_reference: order_reference.to_string(),
            owner: owner.to_string(),
            amount,
            processed_at: Utc::now(),
        };
        self.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    fn sorted_orders(&self, keep: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.iter().filter(|o| keep(o)).cloned().collect();
        // same order as the SQL backend: uploaded_at, then number
        orders.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.number.cmp(&b.number))
        });
        orders
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed order row as-is (fixtures, imports).
    pub fn seed_order(&self, order: Order) -> StoreResult<()> {
        let mut tables = self.inner.lock();
        if tables.order_index.contains_key(&order.number) {
            return Err(StoreError::AlreadyExists(format!("order {}", order.number)));
        }
        let idx = tables.orders.len();
        tables.order_index.insert(order.number.clone(), idx);
        tables.orders.push(order);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(
        &self,
        number: &str,
        owner: &str,
        status: OrderStatus,
    ) -> StoreResult<Order> {
        let order = Order {
            number: number.to_string(),
            owner: owner.to_string(),
            status,
            accrual: None,
            uploaded_at: Utc::now(),
        };
        self.seed_order(order.clone())?;
        Ok(order)
    }

    async fn get_order(&self, number: &str) -> StoreResult<Order> {
        let tables = self.inner.lock();
        tables
            .order_index
            .get(number)
            .map(|&idx| tables.orders[idx].clone())
            .ok_or_else(|| StoreError::NotFound(format!("order {number}")))
    }

    async fn list_orders(&self, owner: &str) -> StoreResult<Vec<Order>> {
        Ok(self.inner.lock().sorted_orders(|o| o.owner == owner))
    }

    async fn list_pending(&self) -> StoreResult<Vec<Order>> {
        Ok(self.inner.lock().sorted_orders(|o| o.status.is_pending()))
    }

    async fn update_status(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> StoreResult<StatusUpdate> {
        let accrual = normalize_accrual(status, accrual);
        let mut tables = self.inner.lock();
        let idx = *tables
            .order_index
            .get(number)
            .ok_or_else(|| StoreError::NotFound(format!("order {number}")))?;
        let order = &mut tables.orders[idx];

        if order.status == status && order.accrual == accrual {
            return Ok(StatusUpdate::Unchanged);
        }
        if !order.status.can_transition_to(status) {
            return Err(StoreError::TerminalState {
                number: number.to_string(),
                status: order.status,
            });
        }
        order.status = status;
        order.accrual = accrual;
        Ok(StatusUpdate::Applied)
    }
}

#[async_trait]
impl WithdrawalStore for MemoryStore {
    async fn create_withdrawal(
        &self,
        order_reference: &str,
        owner: &str,
        amount: Decimal,
    ) -> StoreResult<Withdrawal> {
        self.inner
            .lock()
            .insert_withdrawal(order_reference, owner, amount)
    }

    async fn list_withdrawals(&self, owner: &str) -> StoreResult<Vec<Withdrawal>> {
        let tables = self.inner.lock();
        let mut rows: Vec<Withdrawal> = tables
            .withdrawals
            .iter()
            .filter(|w| w.owner == owner)
            .cloned()
            .collect();
        rows.sort_by_key(|w| w.processed_at);
        Ok(rows)
    }
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn balance(&self, owner: &str) -> StoreResult<Balance> {
        Ok(self.inner.lock().balance(owner))
    }

    async fn debit(
        &self,
        owner: &str,
        order_reference: &str,
        amount: Decimal,
    ) -> StoreResult<Withdrawal> {
        if amount <= Decimal::ZERO {
            return Err(StoreError::InvalidAmount(amount));
        }
        let mut tables = self.inner.lock();
        let balance = tables.balance(owner);
        if !balance.covers(amount) {
            return Err(StoreError::InsufficientBalance {
                requested: amount,
                available: balance.current,
            });
        }
        tables.insert_withdrawal(order_reference, owner, amount)
    }
}
