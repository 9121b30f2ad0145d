//! Data models
//!
//! Shared between the ledger server and any surface built on it.

pub mod balance;
pub mod order;
pub mod withdrawal;

// Re-exports
pub use balance::*;
pub use order::*;
pub use withdrawal::*;
