//! Authentication routes
//!
//! Endpoints for registration, login, token refresh/logout, password
//! reset and change, and the Google OAuth flow.

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult, AuthError};
use crate::services::AuthService;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use identity_shared::types::{
    AccountProfile, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
    MessageResponse, RefreshTokenRequest, RegisterRequest, ResetPasswordRequest, TokenPair,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

/// Uniform response for forgot-password, sent whether or not the account
/// exists.
const RESET_REQUESTED_MESSAGE: &str = "If the email exists, a password reset link has been sent";

/// Create auth routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/change-password", post(change_password))
        .route("/google/login", get(google_login))
        .route("/google/callback", get(google_callback))
}

/// Register a new account
///
/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<LoginResponse>)> {
    let response =
        AuthService::register(&state.db, state.jwt(), &req.email, &req.password, &req.name).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with email and password
///
/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let response = AuthService::login(&state.db, state.jwt(), &req.email, &req.password).await?;
    Ok(Json(response))
}

/// Rotate a refresh token into a new token pair
///
/// POST /api/v1/auth/refresh
async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> ApiResult<Json<TokenPair>> {
    let tokens = AuthService::refresh_tokens(&state.db, state.jwt(), &req.refresh_token).await?;
    Ok(Json(tokens))
}

/// Logout by blacklisting the presented access token
///
/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<Json<MessageResponse>> {
    AuthService::logout(state.blacklist(), &auth_user.token).await?;
    Ok(Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    }))
}

/// Get the authenticated account's profile
///
/// GET /api/v1/auth/me
async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<Json<AccountProfile>> {
    let profile = AuthService::get_profile(&state.db, &auth_user.account_id).await?;
    Ok(Json(profile))
}

/// Request a password-reset token
///
/// POST /api/v1/auth/forgot-password
///
/// Always answers with the same success message so the response never
/// reveals whether the email is registered.
async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let token = AuthService::request_password_reset(&state.db, state.jwt(), &req.email).await?;

    if let Some(token) = token {
        // Delivery is out of band; in development the link is logged
        if !AppConfig::is_production() {
            info!(
                "Password reset link: {}/reset-password/{}",
                state.config().frontend_url,
                token
            );
        }
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUESTED_MESSAGE.to_string(),
    }))
}

/// Reset a password using a reset token
///
/// POST /api/v1/auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    AuthService::reset_password(&state.db, state.jwt(), &req.token, &req.new_password).await?;
    Ok(Json(MessageResponse {
        message: "Password has been successfully reset".to_string(),
    }))
}

/// Change the authenticated account's password
///
/// POST /api/v1/auth/change-password
async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    AuthService::change_password(
        &state.db,
        &auth_user.account_id,
        &req.current_password,
        &req.new_password,
    )
    .await?;

    Ok(Json(MessageResponse {
        message: "Password has been successfully changed".to_string(),
    }))
}

/// Redirect to Google's consent screen
///
/// GET /api/v1/auth/google/login
async fn google_login(State(state): State<AppState>) -> ApiResult<Redirect> {
    let csrf_state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let url = state
        .google()
        .authorize_url(&csrf_state)
        .map_err(ApiError::Internal)?;

    Ok(Redirect::temporary(&url))
}

/// Query parameters of the Google OAuth callback
#[derive(Debug, Deserialize)]
struct GoogleCallbackQuery {
    code: String,
}

/// Handle the Google OAuth callback and authenticate the account
///
/// GET /api/v1/auth/google/callback
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
) -> ApiResult<Json<LoginResponse>> {
    let userinfo = match state.google().exchange_code(&query.code).await {
        Ok(userinfo) => userinfo,
        Err(err) => {
            warn!("Google authentication failed: {:#}", err);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let response =
        AuthService::authenticate_with_google(&state.db, state.jwt(), &userinfo).await?;
    Ok(Json(response))
}
