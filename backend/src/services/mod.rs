//! Business logic services
//!
//! Services encapsulate business logic and coordinate between
//! repositories, token primitives, and external providers.

pub mod auth;

pub use auth::AuthService;
