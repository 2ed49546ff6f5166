//! JWT token generation and validation
//!
//! Issues access, refresh, and password-reset tokens with pre-computed
//! keys cached in application state. Tokens carry a `token_type` claim so
//! a token minted for one purpose is rejected everywhere else.

use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const REFRESH_TOKEN_TYPE: &str = "refresh";
pub const RESET_TOKEN_TYPE: &str = "password_reset";

/// Token validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
    #[error("wrong token type")]
    WrongType,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ULID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Unique token id, so two tokens minted in the same second still
    /// differ
    pub jti: String,
    /// Token purpose: "access", "refresh", or "password_reset"
    pub token_type: String,
}

/// Pre-computed JWT keys
///
/// Deriving these is expensive, so they are created once at startup and
/// shared via Arc.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
        }
    }
}

/// JWT service for token operations
///
/// Cheap to clone; create once at startup and store in AppState.
#[derive(Clone)]
pub struct JwtService {
    keys: JwtKeys,
    access_token_expiry_secs: i64,
    refresh_token_expiry_secs: i64,
    reset_token_expiry_secs: i64,
}

impl JwtService {
    pub fn new(
        secret: &str,
        access_token_expiry_secs: i64,
        refresh_token_expiry_secs: i64,
        reset_token_expiry_secs: i64,
    ) -> Self {
        Self {
            keys: JwtKeys::new(secret),
            access_token_expiry_secs,
            refresh_token_expiry_secs,
            reset_token_expiry_secs,
        }
    }

    /// Generate an access token for an account
    #[inline]
    pub fn generate_access_token(&self, account_id: &str) -> Result<String> {
        self.generate_token(account_id, ACCESS_TOKEN_TYPE, self.access_token_expiry_secs)
    }

    /// Generate a refresh token for an account
    #[inline]
    pub fn generate_refresh_token(&self, account_id: &str) -> Result<String> {
        self.generate_token(account_id, REFRESH_TOKEN_TYPE, self.refresh_token_expiry_secs)
    }

    /// Generate a password-reset token for an account
    #[inline]
    pub fn generate_reset_token(&self, account_id: &str) -> Result<String> {
        self.generate_token(account_id, RESET_TOKEN_TYPE, self.reset_token_expiry_secs)
    }

    /// Generate a token with the given type and expiry
    pub(crate) fn generate_token(
        &self,
        account_id: &str,
        token_type: &str,
        expiry_secs: i64,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(expiry_secs);

        let claims = Claims {
            sub: account_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: ulid::Ulid::new().to_string(),
            token_type: token_type.to_string(),
        };

        encode(&Header::default(), &claims, &self.keys.encoding)
            .map_err(|e| anyhow::anyhow!("Failed to generate {} token: {}", token_type, e))
    }

    /// Validate a token signature and expiry, returning its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.keys.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    /// Validate an access token specifically
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_typed_token(token, ACCESS_TOKEN_TYPE)
    }

    /// Validate a refresh token specifically
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_typed_token(token, REFRESH_TOKEN_TYPE)
    }

    /// Validate a password-reset token specifically
    pub fn validate_reset_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_typed_token(token, RESET_TOKEN_TYPE)
    }

    fn validate_typed_token(&self, token: &str, expected: &str) -> Result<Claims, TokenError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    /// Access-token lifetime in seconds
    #[inline]
    pub fn access_token_expiry_secs(&self) -> i64 {
        self.access_token_expiry_secs
    }

    /// Reset-token lifetime in seconds
    #[inline]
    pub fn reset_token_expiry_secs(&self) -> i64 {
        self.reset_token_expiry_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn create_test_service() -> JwtService {
        JwtService::new("test-secret", 3600, 604800, 3600)
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let service = create_test_service();
        let account_id = Ulid::new().to_string();

        let token = service.generate_access_token(&account_id).unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, account_id);
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_generate_and_validate_refresh_token() {
        let service = create_test_service();
        let account_id = Ulid::new().to_string();

        let token = service.generate_refresh_token(&account_id).unwrap();
        let claims = service.validate_refresh_token(&token).unwrap();

        assert_eq!(claims.sub, account_id);
        assert_eq!(claims.token_type, "refresh");
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let service = create_test_service();
        let token = service.generate_access_token(&Ulid::new().to_string()).unwrap();

        assert_eq!(
            service.validate_refresh_token(&token),
            Err(TokenError::WrongType)
        );
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let service = create_test_service();
        let token = service.generate_refresh_token(&Ulid::new().to_string()).unwrap();

        assert_eq!(
            service.validate_access_token(&token),
            Err(TokenError::WrongType)
        );
    }

    #[test]
    fn test_reset_token_rejected_as_access_and_refresh() {
        let service = create_test_service();
        let token = service.generate_reset_token(&Ulid::new().to_string()).unwrap();

        assert_eq!(
            service.validate_access_token(&token),
            Err(TokenError::WrongType)
        );
        assert_eq!(
            service.validate_refresh_token(&token),
            Err(TokenError::WrongType)
        );
        assert!(service.validate_reset_token(&token).is_ok());
    }

    #[test]
    fn test_consecutive_tokens_differ() {
        let service = create_test_service();
        let account_id = Ulid::new().to_string();

        let first = service.generate_access_token(&account_id).unwrap();
        let second = service.generate_access_token(&account_id).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_token_rejected() {
        let service = create_test_service();

        assert_eq!(
            service.validate_token("invalid.token.here"),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let service = create_test_service();
        let other = JwtService::new("other-secret", 3600, 604800, 3600);
        let token = other.generate_access_token(&Ulid::new().to_string()).unwrap();

        assert_eq!(service.validate_token(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_expired_token_rejected() {
        // Expiries beyond the default 60s validation leeway
        let expired = JwtService::new("test-secret", -120, -120, -120);
        let token = expired.generate_access_token(&Ulid::new().to_string()).unwrap();

        let validating = create_test_service();
        assert_eq!(
            validating.validate_access_token(&token),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_service_is_clone_cheap() {
        let service = create_test_service();
        let _cloned = service.clone();
    }
}
