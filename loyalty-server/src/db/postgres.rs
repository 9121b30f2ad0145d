//! PostgreSQL-backed store
//!
//! Balance reads run in a `REPEATABLE READ, READ ONLY` transaction so both
//! aggregates see one snapshot. Debits run `SERIALIZABLE`: two concurrent
//! debits for one login cannot both observe the pre-debit balance, one of
//! them is aborted with a serialization failure and retried from scratch.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{Balance, Order, OrderStatus, Withdrawal};
use sqlx::{PgConnection, PgPool};

use super::{
    Ledger, OrderStore, StatusUpdate, WithdrawalStore, normalize_accrual, orders, withdrawals,
};
use crate::error::{StoreError, StoreResult};

/// Debit attempts when no limit is configured
pub const DEFAULT_DEBIT_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    debit_attempts: u32,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            debit_attempts: DEFAULT_DEBIT_ATTEMPTS,
        }
    }

    /// Total attempts for a debit that keeps hitting serialization conflicts
    pub fn with_debit_attempts(mut self, attempts: u32) -> Self {
        self.debit_attempts = attempts.max(1);
        self
    }

    async fn totals(conn: &mut PgConnection, login: &str) -> StoreResult<Balance> {
        let accrued = orders::accrued_total(&mut *conn, login).await?;
        let withdrawn = withdrawals::withdrawn_total(&mut *conn, login).await?;
        Ok(Balance::from_totals(accrued, withdrawn))
    }

    async fn try_debit(
        &self,
        login: &str,
        order_reference: &str,
        amount: Decimal,
    ) -> StoreResult<Withdrawal> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let balance = Self::totals(&mut tx, login).await?;
        if !balance.covers(amount) {
            tx.rollback().await?;
            return Err(StoreError::InsufficientBalance {
                requested: amount,
                available: balance.current,
            });
        }

        let Some(withdrawal) = withdrawals::insert(&mut *tx, order_reference, login, amount).await?
        else {
            tx.rollback().await?;
            return Err(StoreError::AlreadyExists(format!(
                "withdrawal for order {order_reference}"
            )));
        };

        tx.commit().await?;
        Ok(withdrawal)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(
        &self,
        number: &str,
        owner: &str,
        status: OrderStatus,
    ) -> StoreResult<Order> {
        orders::insert(&self.pool, number, owner, status)
            .await?
            .ok_or_else(|| StoreError::AlreadyExists(format!("order {number}")))
    }

    async fn get_order(&self, number: &str) -> StoreResult<Order> {
        orders::find(&self.pool, number)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("order {number}")))
    }

    async fn list_orders(&self, owner: &str) -> StoreResult<Vec<Order>> {
        orders::list_by_login(&self.pool, owner).await
    }

    async fn list_pending(&self) -> StoreResult<Vec<Order>> {
        orders::list_pending(&self.pool).await
    }

    async fn update_status(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> StoreResult<StatusUpdate> {
        let accrual = normalize_accrual(status, accrual);
        if orders::update_pending_status(&self.pool, number, status, accrual).await? {
            return Ok(StatusUpdate::Applied);
        }

        // Nothing changed: find out why
        let current = self.get_order(number).await?;
        if current.status == status && current.accrual == accrual {
            Ok(StatusUpdate::Unchanged)
        } else {
            Err(StoreError::TerminalState {
                number: number.to_string(),
                status: current.status,
            })
        }
    }
}

#[async_trait]
impl WithdrawalStore for PgStore {
    async fn create_withdrawal(
        &self,
        order_reference: &str,
        owner: &str,
        amount: Decimal,
    ) -> StoreResult<Withdrawal> {
        if amount <= Decimal::ZERO {
            return Err(StoreError::InvalidAmount(amount));
        }
        withdrawals::insert(&self.pool, order_reference, owner, amount)
            .await?
            .ok_or_else(|| {
                StoreError::AlreadyExists(format!("withdrawal for order {order_reference}"))
            })
    }

    async fn list_withdrawals(&self, owner: &str) -> StoreResult<Vec<Withdrawal>> {
        withdrawals::list_by_login(&self.pool, owner).await
    }
}

#[async_trait]
impl Ledger for PgStore {
    async fn balance(&self, owner: &str) -> StoreResult<Balance> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        let balance = Self::totals(&mut tx, owner).await?;
        tx.commit().await?;
        Ok(balance)
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

        let mut attempt = 1;
        loop {
            match self.try_debit(owner, order_reference, amount).await {
                Err(e) if e.is_serialization_failure() && attempt < self.debit_attempts => {
                    tracing::warn!(
                        login = owner,
                        order = order_reference,
                        attempt,
                        max_attempts = self.debit_attempts,
                        "Debit hit a serialization conflict, retrying"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
