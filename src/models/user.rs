// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use crate::time_utils::rfc3339;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User record stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque user ID (also used as document ID)
    #[serde(rename = "_id")]
    pub id: String,
    /// Login email, unique and case-sensitive as stored
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    /// When the account was created
    #[serde(with = "rfc3339")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    #[serde(with = "rfc3339")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Google OAuth token bundle (stored in the `tokens` collection, keyed by user ID).
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    /// Absent when Google did not issue one (e.g. consent without offline access)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires
    #[serde(with = "rfc3339")]
    pub expiry_date: DateTime<Utc>,
    /// Granted OAuth scopes (space separated, as returned by Google)
    #[serde(default)]
    pub scope: String,
    #[serde(with = "rfc3339")]
    pub updated_at: DateTime<Utc>,
}

impl TokenBundle {
    /// Whether the access token is still usable `margin` from now.
    pub fn is_live(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        !self.access_token.is_empty() && now + margin < self.expiry_date
    }
}

impl std::fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBundle")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expiry_date", &self.expiry_date)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Email uniqueness claim (stored in `user_emails`, keyed by URL-encoded email).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailClaim {
    pub user_id: String,
}
