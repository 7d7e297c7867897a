// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User search (for sharing calendars).

use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::Result;
use crate::extract::ValidatedJson;
use crate::middleware::AuthUser;
use crate::models::UserResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(search_users))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchRequest {
    /// Substring of the email; empty matches everyone
    #[serde(default)]
    #[validate(length(max = 254, message = "Search term is too long."))]
    user_search: String,
}

#[derive(Serialize)]
pub struct UserSearchResponse {
    pub message: String,
    pub data: Vec<UserResponse>,
}

/// Other users whose email contains the search term, case-insensitively.
async fn search_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UserSearchRequest>,
) -> Result<Json<UserSearchResponse>> {
    let matches = state
        .db
        .search_users(body.user_search.trim(), &user.user_id)
        .await?;

    Ok(Json(UserSearchResponse {
        message: "success".to_string(),
        data: matches.into_iter().map(UserResponse::from).collect(),
    }))
}
