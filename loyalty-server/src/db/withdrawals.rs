//! Withdrawal queries (PostgreSQL)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::models::Withdrawal;
use sqlx::PgExecutor;

use crate::error::StoreResult;

#[derive(sqlx::FromRow)]
pub struct WithdrawalRow {
    pub order_reference: String,
    pub login: String,
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

impl From<WithdrawalRow> for Withdrawal {
    fn from(row: WithdrawalRow) -> Self {
        Withdrawal {
            order_reference: row.order_reference,
            owner: row.login,
            amount: row.sum,
            processed_at: row.processed_at,
        }
    }
}

/// Returns `None` when a withdrawal already references this order.
pub async fn insert(
    db: impl PgExecutor<'_>,
    order_reference: &str,
    login: &str,
    amount: Decimal,
) -> StoreResult<Option<Withdrawal>> {
    let row: Option<WithdrawalRow> = sqlx::query_as(
        "INSERT INTO withdrawals (order_reference, login, sum) VALUES ($1, $2, $3)
         ON CONFLICT (order_reference) DO NOTHING
         RETURNING order_reference, login, sum, processed_at",
    )
    .bind(order_reference)
    .bind(login)
    .bind(amount)
    .fetch_optional(db)
    .await?;
    Ok(row.map(Withdrawal::from))
}

pub async fn list_by_login(db: impl PgExecutor<'_>, login: &str) -> StoreResult<Vec<Withdrawal>> {
    let rows: Vec<WithdrawalRow> = sqlx::query_as(
        "SELECT order_reference, login, sum, processed_at FROM withdrawals
         WHERE login = $1
         ORDER BY processed_at ASC",
    )
    .bind(login)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(Withdrawal::from).collect())
}

/// Σ amount of the login's withdrawals
pub async fn withdrawn_total(db: impl PgExecutor<'_>, login: &str) -> StoreResult<Decimal> {
    let total: Decimal =
        sqlx::query_scalar("SELECT COALESCE(SUM(sum), 0) FROM withdrawals WHERE login = $1")
            .bind(login)
            .fetch_one(db)
            .await?;
    Ok(total)
}
