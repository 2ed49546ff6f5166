//! Shared types for the identity backend
//!
//! This crate holds the API request/response types and input validation
//! used by the backend service.

pub mod types;
pub mod validation;

pub use types::{
    AccountProfile, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
    MessageResponse, RefreshTokenRequest, RegisterRequest, ResetPasswordRequest, TokenPair,
};
