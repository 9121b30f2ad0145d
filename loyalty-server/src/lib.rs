//! loyalty-server: loyalty-points ledger and accrual reconciliation
//!
//! - `db`: order/withdrawal stores and the balance ledger (Postgres, in-memory)
//! - `accrual`: client for the external accrual service
//! - `reconcile`: background worker polling pending orders
//! - `services`: operations consumed by the HTTP layer

pub mod accrual;
pub mod config;
pub mod db;
pub mod error;
pub mod reconcile;
pub mod services;
pub mod state;

pub use config::Config;
pub use state::AppState;
