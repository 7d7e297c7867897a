// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication routes.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS, SYNC_COOKIE};
use crate::models::{User, UserResponse};
use crate::services::password::{hash_password_async, verify_password_async};
use crate::AppState;

/// Routes that do not need a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/emailSignup", post(email_signup))
        .route("/emailLogin", post(email_login))
}

/// Routes behind the session middleware.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/logout", get(logout))
}

/// Signup and login body.
#[derive(Deserialize, Validate)]
pub struct EmailCredentials {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password are required."))]
    email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password are required."))]
    password: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MessageResponse {
    pub message: String,
}

/// Create an account and start a session.
async fn email_signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<EmailCredentials>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    // Cheap early exit; the insert below is what actually enforces uniqueness.
    if state.db.find_user_by_email(&body.email).await?.is_some() {
        return Err(AppError::UserExists);
    }

    let password_hash = hash_password_async(body.password).await?;
    let user = User::new(body.email, password_hash);
    state.db.insert_user(&user).await?;

    tracing::info!(user_id = %user.id, "User signed up");

    let jar = jar.add(session_cookie(
        issue_session(&user.id, &state)?,
        state.config.secure_cookies(),
    ));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            message: "User created successfully".to_string(),
            user: user.into(),
        }),
    ))
}

/// Check email and password and start a session.
async fn email_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<EmailCredentials>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let user = state
        .db
        .find_user_by_email(&body.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password_async(user.password_hash.clone(), body.password).await? {
        tracing::info!(user_id = %user.id, "Login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    tracing::info!(user_id = %user.id, "User logged in");

    let jar = jar.add(session_cookie(
        issue_session(&user.id, &state)?,
        state.config.secure_cookies(),
    ));

    Ok((
        jar,
        Json(AuthResponse {
            message: "Logged in".to_string(),
            user: user.into(),
        }),
    ))
}

/// Clear the session cookie. The token itself stays valid until it expires.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let mut expired = session_cookie(String::new(), state.config.secure_cookies());
    expired.set_max_age(time::Duration::ZERO);

    (
        jar.add(expired),
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}

fn issue_session(user_id: &str, state: &AppState) -> Result<String> {
    create_jwt(user_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))
}

/// HttpOnly session cookie.
pub(crate) fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS))
        .build()
}

/// Script-readable marker that Google sync is linked.
///
/// Cross-site frontends need `SameSite=None`, which browsers only accept with `Secure`.
pub(crate) fn sync_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SYNC_COOKIE, "1"))
        .path("/")
        .http_only(false)
        .same_site(if secure { SameSite::None } else { SameSite::Lax })
        .secure(secure)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS))
        .build()
}
