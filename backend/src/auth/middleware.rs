//! Bearer-token extraction
//!
//! Axum extractor that validates the access token, consults the
//! blacklist, and sanity-checks the subject id. A revoked token is
//! rejected with the same response as an invalid one.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::FromRef,
    http::{header::AUTHORIZATION, request::Parts},
};
use ulid::Ulid;

/// Authenticated caller extracted from the Authorization header
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Account ULID from the token subject
    pub account_id: String,
    /// Raw bearer token, kept for logout blacklisting
    pub token: String,
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Invalid authorization format".to_string()))?;

        let claims = app_state
            .jwt()
            .validate_access_token(token)
            .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;

        if app_state
            .blacklist()
            .contains(token)
            .await
            .map_err(ApiError::Internal)?
        {
            return Err(ApiError::Unauthorized("Invalid token".to_string()));
        }

        // Subject must be a well-formed ULID
        if Ulid::from_string(&claims.sub).is_err() {
            return Err(ApiError::Unauthorized("Invalid token".to_string()));
        }

        Ok(AuthUser {
            account_id: claims.sub,
            token: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_user_debug() {
        let user = AuthUser {
            account_id: Ulid::new().to_string(),
            token: "token".to_string(),
        };
        let debug_str = format!("{:?}", user);
        assert!(debug_str.contains("AuthUser"));
    }
}
