//! Integration tests for authentication endpoints

mod common;

use axum::http::StatusCode;
use identity_backend::auth::JwtService;
use identity_backend::repositories::AccountRepository;
use identity_backend::services::AuthService;
use serde_json::json;

#[tokio::test]
#[ignore = "requires database"]
async fn test_register_success() {
    let app = common::TestApp::new().await;

    let email = format!("register_{}@example.com", ulid::Ulid::new());
    let body = json!({
        "email": email,
        "password": "SecurePassword123!",
        "name": "New Person"
    });

    let (status, response) = app.post("/api/v1/auth/register", &body.to_string()).await;

    assert_eq!(status, StatusCode::CREATED);

    let response: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert!(!response["access_token"].as_str().unwrap().is_empty());
    assert!(!response["refresh_token"].as_str().unwrap().is_empty());
    assert_eq!(response["token_type"], "Bearer");
    assert_eq!(response["account"]["email"], email.to_lowercase());
    assert_eq!(response["account"]["tier"], "free");
    assert_eq!(response["account"]["id"].as_str().unwrap().len(), 26);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_register_never_leaks_password_fields() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    let (status, response) = app
        .get_auth("/api/v1/auth/me", &account.login.access_token)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!response.contains("password_hash"));
    assert!(!response.contains("reset_token"));
    assert!(response.contains(&account.login.account.id));
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_register_duplicate_email() {
    let app = common::TestApp::new().await;

    let email = format!("duplicate_{}@example.com", ulid::Ulid::new());
    let body = json!({
        "email": email,
        "password": "SecurePassword123!",
        "name": "First"
    });

    let (status, _) = app.post("/api/v1/auth/register", &body.to_string()).await;
    assert_eq!(status, StatusCode::CREATED);

    // Second registration with same email should fail
    let (status, _) = app.post("/api/v1/auth/register", &body.to_string()).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_register_email_normalization_collides() {
    let app = common::TestApp::new().await;

    let local = format!("normalize_{}", ulid::Ulid::new());
    let first = json!({
        "email": format!("{}@Example.COM ", local),
        "password": "SecurePassword123!",
        "name": "First Person"
    });
    let second = json!({
        "email": format!("{}@example.com", local.to_lowercase()),
        "password": "SecurePassword123!",
        "name": "Second Person"
    });

    let (status, _) = app.post("/api/v1/auth/register", &first.to_string()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.post("/api/v1/auth/register", &second.to_string()).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_login_after_register() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    let body = json!({
        "email": account.email,
        "password": account.password
    });
    let (status, response) = app.post("/api/v1/auth/login", &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);

    let response: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert!(!response["access_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_login_with_unnormalized_email() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    let body = json!({
        "email": format!("  {} ", account.email.to_uppercase()),
        "password": account.password
    });
    let (status, _) = app.post("/api/v1/auth/login", &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_login_failures_are_indistinguishable() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    let wrong_password = json!({
        "email": account.email,
        "password": "WrongPassword123!"
    });
    let unknown_email = json!({
        "email": format!("unknown_{}@example.com", ulid::Ulid::new()),
        "password": "WrongPassword123!"
    });

    let (status_a, body_a) = app
        .post("/api/v1/auth/login", &wrong_password.to_string())
        .await;
    let (status_b, body_b) = app
        .post("/api/v1/auth/login", &unknown_email.to_string())
        .await;

    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_b, StatusCode::UNAUTHORIZED);
    // Same body whether the email exists or not
    assert_eq!(body_a, body_b);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_refresh_rotates_tokens() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    let body = json!({ "refresh_token": account.login.refresh_token });
    let (status, response) = app.post("/api/v1/auth/refresh", &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);

    let response: serde_json::Value = serde_json::from_str(&response).unwrap();
    let new_access = response["access_token"].as_str().unwrap();
    let new_refresh = response["refresh_token"].as_str().unwrap();

    assert_ne!(new_access, account.login.access_token);
    assert_ne!(new_refresh, account.login.refresh_token);

    // The rotated refresh token mints another pair
    let body = json!({ "refresh_token": new_refresh });
    let (status, _) = app.post("/api/v1/auth/refresh", &body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_refresh_token_invalid() {
    let app = common::TestApp::new().await;

    let body = json!({ "refresh_token": "invalid-token" });
    let (status, _) = app.post("/api/v1/auth/refresh", &body.to_string()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_refresh_for_deleted_account() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    sqlx::query("DELETE FROM accounts WHERE id = $1")
        .bind(&account.login.account.id)
        .execute(&app.pool)
        .await
        .unwrap();

    let body = json!({ "refresh_token": account.login.refresh_token });
    let (status, _) = app.post("/api/v1/auth/refresh", &body.to_string()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_inactive_account_cannot_login_or_refresh() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    sqlx::query("UPDATE accounts SET is_active = FALSE WHERE id = $1")
        .bind(&account.login.account.id)
        .execute(&app.pool)
        .await
        .unwrap();

    let body = json!({
        "email": account.email,
        "password": account.password
    });
    let (status, _) = app.post("/api/v1/auth/login", &body.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = json!({ "refresh_token": account.login.refresh_token });
    let (status, _) = app.post("/api/v1/auth/refresh", &body.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_logout_revokes_presented_token_only() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;
    let other = app.register_account().await;

    // The token works before logout
    let (status, _) = app
        .get_auth("/api/v1/auth/me", &account.login.access_token)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post_auth("/api/v1/auth/logout", "", &account.login.access_token)
        .await;
    assert_eq!(status, StatusCode::OK);

    // The exact token is now rejected
    let (status, _) = app
        .get_auth("/api/v1/auth/me", &account.login.access_token)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A different account's token is unaffected
    let (status, _) = app
        .get_auth("/api/v1/auth/me", &other.login.access_token)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_forgot_password_uniform_response() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    let existing = json!({ "email": account.email });
    let unknown = json!({
        "email": format!("nobody_{}@example.com", ulid::Ulid::new())
    });

    let (status_a, body_a) = app
        .post("/api/v1/auth/forgot-password", &existing.to_string())
        .await;
    let (status_b, body_b) = app
        .post("/api/v1/auth/forgot-password", &unknown.to_string())
        .await;

    assert_eq!(status_a, StatusCode::OK);
    assert_eq!(status_b, StatusCode::OK);
    assert_eq!(body_a, body_b);

    // Only the real account gained a stored reset token
    let stored: Option<String> =
        sqlx::query_scalar("SELECT reset_token FROM accounts WHERE id = $1")
            .bind(&account.login.account.id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_reset_password_flow_is_single_use() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    let token = AuthService::request_password_reset(&app.pool, app.state.jwt(), &account.email)
        .await
        .unwrap()
        .expect("active account should get a reset token");

    let body = json!({
        "token": token,
        "new_password": "BrandNewPassword456!"
    });
    let (status, _) = app
        .post("/api/v1/auth/reset-password", &body.to_string())
        .await;
    assert_eq!(status, StatusCode::OK);

    // Old password no longer works, new one does
    let old_login = json!({ "email": account.email, "password": account.password });
    let (status, _) = app.post("/api/v1/auth/login", &old_login.to_string()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let new_login = json!({ "email": account.email, "password": "BrandNewPassword456!" });
    let (status, _) = app.post("/api/v1/auth/login", &new_login.to_string()).await;
    assert_eq!(status, StatusCode::OK);

    // The token was cleared on use
    let (status, _) = app
        .post("/api/v1/auth/reset-password", &body.to_string())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_reset_password_expired_token_rejected() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    // Mint an already-expired reset token with the app's secret and store
    // it as the outstanding token
    let expired_jwt = JwtService::new("test-secret-key-for-testing-only-32chars", 3600, 604800, -120);
    let token = expired_jwt
        .generate_reset_token(&account.login.account.id)
        .unwrap();
    AccountRepository::store_reset_token(
        &app.pool,
        &account.login.account.id,
        &token,
        chrono::Utc::now() - chrono::Duration::seconds(120),
    )
    .await
    .unwrap();

    let body = json!({
        "token": token,
        "new_password": "BrandNewPassword456!"
    });
    let (status, _) = app
        .post("/api/v1/auth/reset-password", &body.to_string())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_reset_password_garbage_token_rejected() {
    let app = common::TestApp::new().await;

    let body = json!({
        "token": "not-a-reset-token",
        "new_password": "BrandNewPassword456!"
    });
    let (status, _) = app
        .post("/api/v1/auth/reset-password", &body.to_string())
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_change_password_wrong_current_rejected() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    let body = json!({
        "current_password": "WrongPassword123!",
        "new_password": "BrandNewPassword456!"
    });
    let (status, _) = app
        .post_auth(
            "/api/v1/auth/change-password",
            &body.to_string(),
            &account.login.access_token,
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The password was not changed
    let login = json!({ "email": account.email, "password": account.password });
    let (status, _) = app.post("/api/v1/auth/login", &login.to_string()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_change_password_success() {
    let app = common::TestApp::new().await;
    let account = app.register_account().await;

    let body = json!({
        "current_password": account.password,
        "new_password": "BrandNewPassword456!"
    });
    let (status, _) = app
        .post_auth(
            "/api/v1/auth/change-password",
            &body.to_string(),
            &account.login.access_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let old_login = json!({ "email": account.email, "password": account.password });
    let (status, _) = app.post("/api/v1/auth/login", &old_login.to_string()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let new_login = json!({ "email": account.email, "password": "BrandNewPassword456!" });
    let (status, _) = app.post("/api/v1/auth/login", &new_login.to_string()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_change_password_requires_auth() {
    let app = common::TestApp::new().await;

    let body = json!({
        "current_password": "SecurePassword123!",
        "new_password": "BrandNewPassword456!"
    });
    let (status, _) = app
        .post("/api/v1/auth/change-password", &body.to_string())
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_google_signin_creates_account_once() {
    let app = common::TestApp::new().await;

    let email = format!("google_{}@example.com", ulid::Ulid::new());
    let userinfo = identity_backend::auth::GoogleUserInfo {
        sub: "google-subject-1".to_string(),
        email: email.clone(),
        name: "Google Person".to_string(),
    };

    let first = AuthService::authenticate_with_google(&app.pool, app.state.jwt(), &userinfo)
        .await
        .unwrap();
    let second = AuthService::authenticate_with_google(&app.pool, app.state.jwt(), &userinfo)
        .await
        .unwrap();

    // Same account both times, matched by email
    assert_eq!(first.account.id, second.account.id);
    assert_eq!(first.account.email, email.to_lowercase());

    // The provisioned random password is not guessable, but the account
    // works like any other: its tokens authenticate requests
    let (status, _) = app.get_auth("/api/v1/auth/me", &second.access_token).await;
    assert_eq!(status, StatusCode::OK);
}
