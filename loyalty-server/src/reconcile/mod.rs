//! Background reconciliation of pending orders against the accrual service

mod gate;
mod worker;

pub use gate::CallGate;
pub use worker::{PassSummary, ReconcileConfig, ReconcileError, ReconciliationWorker};
