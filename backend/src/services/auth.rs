//! Authentication service
//!
//! Business logic for registration, login, the token lifecycle, password
//! reset/change, and Google sign-in. Every operation is request-scoped:
//! the only state shared across requests lives in the store and the
//! token blacklist.

use crate::auth::{GoogleUserInfo, JwtService, PasswordService, TokenBlacklist};
use crate::error::{ApiError, AuthError};
use crate::repositories::{AccountRecord, AccountRepository};
use chrono::{Duration, Utc};
use identity_shared::types::{AccountProfile, LoginResponse, TokenPair};
use identity_shared::validation::validate_password_strength;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::PgPool;
use tracing::info;
use ulid::Ulid;
use validator::ValidateEmail;

const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Authentication service
pub struct AuthService;

impl AuthService {
    /// Normalize an email for storage and lookup
    fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Issue an access/refresh pair for a verified account
    ///
    /// Tokens are only ever issued as a pair.
    fn issue_tokens(jwt: &JwtService, account: &AccountRecord) -> Result<LoginResponse, ApiError> {
        let access_token = jwt
            .generate_access_token(&account.id)
            .map_err(ApiError::Internal)?;
        let refresh_token = jwt
            .generate_refresh_token(&account.id)
            .map_err(ApiError::Internal)?;

        Ok(LoginResponse {
            account: account.profile(),
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: jwt.access_token_expiry_secs(),
        })
    }

    /// Register a new account and log it in
    pub async fn register(
        pool: &PgPool,
        jwt: &JwtService,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<LoginResponse, ApiError> {
        let email = Self::normalize_email(email);

        if !email.as_str().validate_email() {
            return Err(ApiError::Validation("Invalid email format".to_string()));
        }
        validate_password_strength(password).map_err(ApiError::Validation)?;
        if name.trim().is_empty() {
            return Err(ApiError::Validation("Name must not be empty".to_string()));
        }

        if AccountRepository::email_exists(pool, &email)
            .await
            .map_err(ApiError::Internal)?
        {
            return Err(AuthError::AccountExists.into());
        }

        let password_hash = PasswordService::hash_async(password.to_string())
            .await
            .map_err(ApiError::Internal)?;

        let account = AccountRepository::create(pool, &email, name.trim(), &password_hash)
            .await
            .map_err(ApiError::Internal)?;

        info!(account_id = %account.id, "account registered");

        Self::issue_tokens(jwt, &account)
    }

    /// Authenticate with email and password
    ///
    /// Unknown email and wrong password produce the same error, so the
    /// response never reveals whether an account exists.
    pub async fn login(
        pool: &PgPool,
        jwt: &JwtService,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, ApiError> {
        let email = Self::normalize_email(email);

        let account = AccountRepository::find_by_email(pool, &email)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !account.verify_password(password).await {
            return Err(AuthError::InvalidCredentials.into());
        }

        if !account.is_active {
            return Err(AuthError::InactiveAccount.into());
        }

        Self::issue_tokens(jwt, &account)
    }

    /// Mint a new token pair from a refresh token (rotation)
    ///
    /// The old refresh token is not revoked; it stays valid until its own
    /// expiry.
    pub async fn refresh_tokens(
        pool: &PgPool,
        jwt: &JwtService,
        refresh_token: &str,
    ) -> Result<TokenPair, ApiError> {
        let claims = jwt
            .validate_refresh_token(refresh_token)
            .map_err(AuthError::from)?;

        // Subject must be a well-formed 26-character ULID
        if claims.sub.len() != 26 || Ulid::from_string(&claims.sub).is_err() {
            return Err(AuthError::InvalidToken.into());
        }

        let account = AccountRepository::find_by_id(pool, &claims.sub)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(AuthError::AccountNotFound)?;

        if !account.is_active {
            return Err(AuthError::InactiveAccount.into());
        }

        let access_token = jwt
            .generate_access_token(&account.id)
            .map_err(ApiError::Internal)?;
        let new_refresh_token = jwt
            .generate_refresh_token(&account.id)
            .map_err(ApiError::Internal)?;

        Ok(TokenPair {
            access_token,
            refresh_token: new_refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: jwt.access_token_expiry_secs(),
        })
    }

    /// Revoke the presented access token
    pub async fn logout(blacklist: &dyn TokenBlacklist, access_token: &str) -> Result<(), ApiError> {
        blacklist.add(access_token).await.map_err(ApiError::Internal)
    }

    /// Public-safe view of the authenticated account
    pub async fn get_profile(pool: &PgPool, account_id: &str) -> Result<AccountProfile, ApiError> {
        let account = AccountRepository::find_by_id(pool, account_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(AuthError::AccountNotFound)?;

        if !account.is_active {
            return Err(AuthError::InactiveAccount.into());
        }

        Ok(account.profile())
    }

    /// Generate and store a password-reset token
    ///
    /// Returns None for unknown or inactive accounts with no side effect;
    /// the route answers with the same success message either way, so the
    /// response never reveals whether an account exists. The caller is
    /// responsible for delivering the token out of band.
    pub async fn request_password_reset(
        pool: &PgPool,
        jwt: &JwtService,
        email: &str,
    ) -> Result<Option<String>, ApiError> {
        let email = Self::normalize_email(email);

        let Some(account) = AccountRepository::find_by_email(pool, &email)
            .await
            .map_err(ApiError::Internal)?
        else {
            return Ok(None);
        };

        if !account.is_active {
            return Ok(None);
        }

        let token = jwt
            .generate_reset_token(&account.id)
            .map_err(ApiError::Internal)?;
        let expiry = Utc::now() + Duration::seconds(jwt.reset_token_expiry_secs());

        // Replaces any previous outstanding token
        AccountRepository::store_reset_token(pool, &account.id, &token, expiry)
            .await
            .map_err(ApiError::Internal)?;

        info!(account_id = %account.id, "password reset requested");

        Ok(Some(token))
    }

    /// Reset a password with an outstanding reset token (single use)
    pub async fn reset_password(
        pool: &PgPool,
        jwt: &JwtService,
        token: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        validate_password_strength(new_password).map_err(ApiError::Validation)?;

        let account = AccountRepository::find_by_reset_token(pool, token)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(AuthError::InvalidResetToken)?;

        if !account.is_reset_token_valid(jwt, token) {
            return Err(AuthError::InvalidResetToken.into());
        }

        let password_hash = PasswordService::hash_async(new_password.to_string())
            .await
            .map_err(ApiError::Internal)?;

        // Single statement: sets the new hash and clears the reset token
        AccountRepository::update_password(pool, &account.id, &password_hash)
            .await
            .map_err(ApiError::Internal)?;

        info!(account_id = %account.id, "password reset completed");

        Ok(())
    }

    /// Change the password of an authenticated account
    ///
    /// Tokens issued before the change remain valid until they expire.
    pub async fn change_password(
        pool: &PgPool,
        account_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        validate_password_strength(new_password).map_err(ApiError::Validation)?;

        let account = AccountRepository::find_by_id(pool, account_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(AuthError::AccountNotFound)?;

        if !account.is_active {
            return Err(AuthError::InactiveAccount.into());
        }

        if !account.verify_password(current_password).await {
            return Err(AuthError::InvalidCredentials.into());
        }

        let password_hash = PasswordService::hash_async(new_password.to_string())
            .await
            .map_err(ApiError::Internal)?;

        AccountRepository::update_password(pool, &account.id, &password_hash)
            .await
            .map_err(ApiError::Internal)?;

        info!(account_id = %account.id, "password changed");

        Ok(())
    }

    /// Sign in with a Google identity, creating the account on first use
    ///
    /// Accounts are matched by email only; the provider subject id is
    /// logged but not persisted. New accounts get a random password that
    /// can only be replaced through the reset or change flows.
    pub async fn authenticate_with_google(
        pool: &PgPool,
        jwt: &JwtService,
        userinfo: &GoogleUserInfo,
    ) -> Result<LoginResponse, ApiError> {
        let email = Self::normalize_email(&userinfo.email);

        let account = match AccountRepository::find_by_email(pool, &email)
            .await
            .map_err(ApiError::Internal)?
        {
            Some(account) => account,
            None => {
                let password_hash =
                    PasswordService::hash_async(Self::generate_random_password())
                        .await
                        .map_err(ApiError::Internal)?;

                let account =
                    AccountRepository::create(pool, &email, userinfo.name.trim(), &password_hash)
                        .await
                        .map_err(ApiError::Internal)?;

                info!(
                    account_id = %account.id,
                    google_sub = %userinfo.sub,
                    "account created from google sign-in"
                );

                account
            }
        };

        if !account.is_active {
            return Err(AuthError::InactiveAccount.into());
        }

        Self::issue_tokens(jwt, &account)
    }

    fn generate_random_password() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }
}
