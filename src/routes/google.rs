// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Calendar linking (OAuth consent and callback).

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::routes::auth::sync_cookie;
use crate::services::CredentialStatus;
use crate::AppState;

/// The callback is authenticated by its signed `state`, not the session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/oauth2callback", get(oauth_callback))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/googleAuth", get(google_auth))
}

/// Start linking, or skip straight back to the calendar if already linked.
async fn google_auth(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<Response> {
    match state.oauth.ensure_live_credentials(&user.user_id).await? {
        CredentialStatus::Live(_) => {
            tracing::debug!(user_id = %user.user_id, "Google Calendar already linked");
            Ok(linked_redirect(&state, jar))
        }
        CredentialStatus::NeedsAuthorization => {
            let url = state.oauth.begin_authorization(&user.user_id)?;
            Ok(Redirect::temporary(&url).into_response())
        }
        CredentialStatus::NeedsLogin => Err(AppError::NotLoggedIn),
    }
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback: exchange the code, store tokens, return to the calendar.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    // User declined consent (or Google reported another error).
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        let redirect = format!(
            "{}/calendar?error={}",
            state.config.client_url,
            urlencoding::encode(&error)
        );
        return Ok(Redirect::temporary(&redirect).into_response());
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Authorization code is missing.".to_string()))?;
    let oauth_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("Invalid OAuth state".to_string()))?;

    let (user_id, _) = state
        .oauth
        .complete_authorization(&code, &oauth_state)
        .await?;

    tracing::info!(user_id = %user_id, "Google Calendar linked");

    Ok(linked_redirect(&state, jar))
}

fn linked_redirect(state: &AppState, jar: CookieJar) -> Response {
    let jar = jar.add(sync_cookie(state.config.secure_cookies()));
    let target = format!("{}/calendar", state.config.client_url);
    (jar, Redirect::temporary(&target)).into_response()
}
