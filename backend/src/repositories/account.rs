//! Account repository and record
//!
//! `AccountRecord` is the persisted account row plus its credential
//! behavior; `AccountRepository` is the data access layer over sqlx.

use crate::auth::{JwtService, PasswordService};
use anyhow::Result;
use chrono::{DateTime, Utc};
use identity_shared::types::AccountProfile;
use sqlx::PgPool;
use subtle::ConstantTimeEq;
use ulid::Ulid;

/// Account row from the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRecord {
    /// 26-character ULID, assigned at creation
    pub id: String,
    /// Stored normalized: trimmed and lowercased
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub tier: String,
    pub settings: serde_json::Value,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AccountRecord {
    /// Verify a password candidate against the stored hash
    ///
    /// Returns false on mismatch or an unparsable hash, never an error.
    pub async fn verify_password(&self, candidate: &str) -> bool {
        PasswordService::verify_async(candidate.to_string(), self.password_hash.clone())
            .await
            .unwrap_or(false)
    }

    /// Check a password-reset token candidate against this account
    ///
    /// Fails closed: requires an outstanding stored token, a decodable
    /// non-expired token of type "password_reset", an exact constant-time
    /// match with the stored token, and a subject equal to this account's
    /// id.
    pub fn is_reset_token_valid(&self, jwt: &JwtService, candidate: &str) -> bool {
        let Some(stored) = self.reset_token.as_deref() else {
            return false;
        };

        // Signature, expiry, and type are all checked by the decode
        let Ok(claims) = jwt.validate_reset_token(candidate) else {
            return false;
        };

        if !bool::from(stored.as_bytes().ct_eq(candidate.as_bytes())) {
            return false;
        }

        claims.sub == self.id
    }

    /// Public-safe projection of this account
    ///
    /// Excludes the password hash, settings, and reset-token fields.
    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            is_active: self.is_active,
            created_at: self.created_at,
            tier: self.tier.clone(),
        }
    }
}

/// Account repository for database operations
pub struct AccountRepository;

impl AccountRepository {
    /// Create a new account with a fresh ULID and default tier/settings
    pub async fn create(
        pool: &PgPool,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<AccountRecord> {
        let id = Ulid::new().to_string();

        let account = sqlx::query_as::<_, AccountRecord>(
            r#"
            INSERT INTO accounts (id, email, name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, password_hash, is_active, tier, settings,
                      reset_token, reset_token_expiry, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(pool)
        .await?;

        Ok(account)
    }

    /// Find an account by (normalized) email
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<AccountRecord>> {
        let account = sqlx::query_as::<_, AccountRecord>(
            r#"
            SELECT id, email, name, password_hash, is_active, tier, settings,
                   reset_token, reset_token_expiry, created_at, updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(account)
    }

    /// Find an account by id
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<AccountRecord>> {
        let account = sqlx::query_as::<_, AccountRecord>(
            r#"
            SELECT id, email, name, password_hash, is_active, tier, settings,
                   reset_token, reset_token_expiry, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(account)
    }

    /// Check if an email is already registered
    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool> {
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)
            "#,
        )
        .bind(email)
        .fetch_one(pool)
        .await?;

        Ok(result)
    }

    /// Replace the password hash, clearing any outstanding reset token
    pub async fn update_password(pool: &PgPool, id: &str, password_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2,
                reset_token = NULL,
                reset_token_expiry = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Store a reset token and its expiry, replacing any previous one
    pub async fn store_reset_token(
        pool: &PgPool,
        id: &str,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET reset_token = $2,
                reset_token_expiry = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(expiry)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Find the account holding a given reset token
    ///
    /// Direct indexed lookup by the stored token string; validity is
    /// checked separately by `AccountRecord::is_reset_token_valid`.
    pub async fn find_by_reset_token(pool: &PgPool, token: &str) -> Result<Option<AccountRecord>> {
        let account = sqlx::query_as::<_, AccountRecord>(
            r#"
            SELECT id, email, name, password_hash, is_active, tier, settings,
                   reset_token, reset_token_expiry, created_at, updated_at
            FROM accounts
            WHERE reset_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?;

        Ok(account)
    }
}
