//! Balance, withdraw and withdrawal history

use rust_decimal::Decimal;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Balance, WithdrawRequest, Withdrawal};
use shared::order_number;

use crate::db::{Ledger, WithdrawalStore};
use crate::error::StoreError;

pub async fn balance<S: Ledger + ?Sized>(store: &S, owner: &str) -> AppResult<Balance> {
    Ok(store.balance(owner).await?)
}

/// Spend `req.sum` points against order `req.order`.
pub async fn withdraw<S: Ledger + ?Sized>(
    store: &S,
    owner: &str,
    req: &WithdrawRequest,
) -> AppResult<Withdrawal> {
    let reference = req.order.trim();
    if !order_number::is_valid(reference) {
        return Err(AppError::invalid_order_number(reference));
    }
    if req.sum <= Decimal::ZERO {
        return Err(AppError::new(ErrorCode::InvalidAmount).with_detail("sum", req.sum.to_string()));
    }

    match store.debit(owner, reference, req.sum).await {
        Ok(withdrawal) => {
            tracing::info!(login = owner, order = %reference, sum = %req.sum, "Points withdrawn");
            Ok(withdrawal)
        }
        Err(StoreError::AlreadyExists(_)) => {
            Err(AppError::new(ErrorCode::WithdrawalExists).with_detail("order", reference))
        }
        Err(e @ StoreError::InsufficientBalance { .. }) => {
            tracing::debug!(login = owner, order = %reference, error = %e, "Withdrawal rejected");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Owner's withdrawals, oldest first
pub async fn withdrawals<S: WithdrawalStore + ?Sized>(
    store: &S,
    owner: &str,
) -> AppResult<Vec<Withdrawal>> {
    Ok(store.list_withdrawals(owner).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, OrderStore};
    use http::StatusCode;
    use rust_decimal_macros::dec;
    use shared::models::OrderStatus;

    fn request(order: &str, sum: Decimal) -> WithdrawRequest {
        WithdrawRequest {
            order: order.to_string(),
            sum,
        }
    }

    async fn funded(amount: Decimal) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_order("79927398713", "alice", OrderStatus::New)
            .await
            .unwrap();
        store
            .update_status("79927398713", OrderStatus::Processed, Some(amount))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn withdraw_error_statuses() {
        let store = funded(dec!(100)).await;

        let err = withdraw(&store, "alice", &request("2377225625", dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = withdraw(&store, "alice", &request("2377225624", dec!(0)))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), StatusCode::BAD_REQUEST);

        let err = withdraw(&store, "alice", &request("2377225624", dec!(100)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientBalance);
        assert_eq!(err.http_status(), StatusCode::PAYMENT_REQUIRED);

        withdraw(&store, "alice", &request("2377225624", dec!(10)))
            .await
            .unwrap();
        let err = withdraw(&store, "alice", &request("2377225624", dec!(10)))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), StatusCode::CONFLICT);

        let b = balance(&store, "alice").await.unwrap();
        assert_eq!(b.current, dec!(90));
        assert_eq!(b.withdrawn, dec!(10));
        assert_eq!(withdrawals(&store, "alice").await.unwrap().len(), 1);
    }
}
