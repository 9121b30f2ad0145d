//! Order submission and listing

use http::StatusCode;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Order, OrderStatus};
use shared::order_number;

use crate::db::OrderStore;
use crate::error::StoreError;

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// New order stored with status `NEW`
    Accepted(Order),
    /// The caller had already uploaded this number
    AlreadyUploaded(Order),
}

impl SubmitOutcome {
    pub fn http_status(&self) -> StatusCode {
        match self {
            SubmitOutcome::Accepted(_) => StatusCode::ACCEPTED,
            SubmitOutcome::AlreadyUploaded(_) => StatusCode::OK,
        }
    }

    pub fn order(&self) -> &Order {
        match self {
            SubmitOutcome::Accepted(order) | SubmitOutcome::AlreadyUploaded(order) => order,
        }
    }
}

/// Register an uploaded order number for `owner`.
///
/// A number already uploaded by someone else is a conflict; the same owner
/// uploading twice gets the existing order back.
pub async fn submit<S: OrderStore + ?Sized>(
    store: &S,
    owner: &str,
    raw_number: &str,
) -> AppResult<SubmitOutcome> {
    let number = raw_number.trim();
    if !order_number::is_valid(number) {
        return Err(AppError::invalid_order_number(number));
    }

    match store.create_order(number, owner, OrderStatus::New).await {
        Ok(order) => {
            tracing::info!(order = %number, login = owner, "Order accepted");
            Ok(SubmitOutcome::Accepted(order))
        }
        Err(StoreError::AlreadyExists(_)) => {
            let existing = store.get_order(number).await?;
            if existing.owner == owner {
                tracing::debug!(order = %number, login = owner, "Order already uploaded");
                Ok(SubmitOutcome::AlreadyUploaded(existing))
            } else {
                tracing::debug!(order = %number, login = owner, "Order owned by another user");
                Err(AppError::new(ErrorCode::OrderOwnedByOther).with_detail("order", number))
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Owner's orders, oldest upload first. Empty when none were uploaded.
pub async fn list<S: OrderStore + ?Sized>(store: &S, owner: &str) -> AppResult<Vec<Order>> {
    Ok(store.list_orders(owner).await?)
}
