//! Order queries (PostgreSQL)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::models::{Order, OrderStatus};
use sqlx::PgExecutor;

use crate::error::{StoreError, StoreResult};

const PENDING: [&str; 3] = ["NEW", "REGISTERED", "PROCESSING"];

#[derive(sqlx::FromRow)]
pub struct OrderRow {
    pub number: String,
    pub login: String,
    pub status: String,
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Corrupt(format!("order {}: {e}", row.number)))?;
        Ok(Order {
            number: row.number,
            owner: row.login,
            status,
            accrual: row.accrual,
            uploaded_at: row.uploaded_at,
        })
    }
}

fn into_orders(rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

/// Returns `None` when the number is already taken.
pub async fn insert(
    db: impl PgExecutor<'_>,
    number: &str,
    login: &str,
    status: OrderStatus,
) -> StoreResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(
        "INSERT INTO orders (number, login, status) VALUES ($1, $2, $3)
         ON CONFLICT (number) DO NOTHING
         RETURNING number, login, status, accrual, uploaded_at",
    )
    .bind(number)
    .bind(login)
    .bind(status.as_str())
    .fetch_optional(db)
    .await?;
    row.map(Order::try_from).transpose()
}

pub async fn find(db: impl PgExecutor<'_>, number: &str) -> StoreResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(
        "SELECT number, login, status, accrual, uploaded_at FROM orders WHERE number = $1",
    )
    .bind(number)
    .fetch_optional(db)
    .await?;
    row.map(Order::try_from).transpose()
}

pub async fn list_by_login(db: impl PgExecutor<'_>, login: &str) -> StoreResult<Vec<Order>> {
    let rows: Vec<OrderRow> = sqlx::query_as(
        "SELECT number, login, status, accrual, uploaded_at FROM orders
         WHERE login = $1
         ORDER BY uploaded_at ASC, number ASC",
    )
    .bind(login)
    .fetch_all(db)
    .await?;
    into_orders(rows)
}

pub async fn list_pending(db: impl PgExecutor<'_>) -> StoreResult<Vec<Order>> {
    let rows: Vec<OrderRow> = sqlx::query_as(
        "SELECT number, login, status, accrual, uploaded_at FROM orders
         WHERE status = ANY($1)
         ORDER BY uploaded_at ASC, number ASC",
    )
    .bind(&PENDING[..])
    .fetch_all(db)
    .await?;
    into_orders(rows)
}

/// Move a pending order to `status`. Returns `false` when nothing changed:
/// the order is missing, terminal, or already holds exactly this state.
pub async fn update_pending_status(
    db: impl PgExecutor<'_>,
    number: &str,
    status: OrderStatus,
    accrual: Option<Decimal>,
) -> StoreResult<bool> {
    let result = sqlx::query(
        "UPDATE orders SET status = $2, accrual = $3
         WHERE number = $1
           AND status = ANY($4)
           AND (status <> $2 OR accrual IS DISTINCT FROM $3)",
    )
    .bind(number)
    .bind(status.as_str())
    .bind(accrual)
    .bind(&PENDING[..])
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Σ accrual of the login's `PROCESSED` orders
pub async fn accrued_total(db: impl PgExecutor<'_>, login: &str) -> StoreResult<Decimal> {
    let total: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(accrual), 0) FROM orders
         WHERE login = $1 AND status = 'PROCESSED'",
    )
    .bind(login)
    .fetch_one(db)
    .await?;
    Ok(total)
}
