//! Operations exposed to the HTTP layer
//!
//! Each helper returns `AppResult`, with domain outcomes already translated
//! into `ErrorCode`s the HTTP layer maps to status codes.

pub mod balance;
pub mod orders;
