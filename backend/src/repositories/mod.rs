//! Database repositories
//!
//! Provides the data access layer. Each operation takes the pool as an
//! explicit handle; repositories never hold connections across calls.

pub mod account;

pub use account::{AccountRecord, AccountRepository};
