// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, with an in-memory fallback).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Event, TokenBundle, User};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email uniqueness claims (keyed by URL-encoded email)
    pub const USER_EMAILS: &str = "user_emails";
    pub const TOKENS: &str = "tokens";
    pub const EVENTS: &str = "events";
}

/// Stored field names used in queries and update masks.
pub mod fields {
    pub const CREATED_BY: &str = "createdBy";
    pub const START_TIME: &str = "startTime";
    pub const END_TIME: &str = "endTime";
    pub const TAG: &str = "tag";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const EXPIRY_DATE: &str = "expiry_date";
    pub const UPDATED_AT: &str = "updated_at";
}

/// Document ID for an email claim. Emails may contain characters Firestore IDs reject.
pub(crate) fn email_doc_id(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}

/// Merge two result sets, dropping duplicates, ordered by start time.
pub(crate) fn merge_window_results(first: Vec<Event>, second: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Event> = first
        .into_iter()
        .chain(second)
        .filter(|e| seen.insert(e.id.clone()))
        .collect();
    merged.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
    merged
}

#[derive(Clone)]
enum Backend {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

/// Document store handle shared by all requests. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    backend: Backend,
}

impl Database {
    /// Connect to Firestore (or its emulator when FIRESTORE_EMULATOR_HOST is set).
    pub async fn firestore(project_id: &str) -> Result<Self, AppError> {
        Ok(Self {
            backend: Backend::Firestore(FirestoreDb::new(project_id).await?),
        })
    }

    /// Fresh, empty in-memory store.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryDb::new()),
        }
    }

    /// Firestore handle that fails every call. For tests of error paths.
    pub fn offline() -> Self {
        Self {
            backend: Backend::Firestore(FirestoreDb::new_offline()),
        }
    }

    // ─── Users ───────────────────────────────────────────────────

    /// Insert a user. Fails with `UserExists` if the email is already claimed.
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.insert_user(user).await,
            Backend::Memory(db) => db.insert_user(user),
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.get_user(user_id).await,
            Backend::Memory(db) => Ok(db.get_user(user_id)),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.find_user_by_email(email).await,
            Backend::Memory(db) => Ok(db.find_user_by_email(email)),
        }
    }

    /// Users whose email contains `needle` (case-insensitive), excluding `exclude_id`.
    pub async fn search_users(&self, needle: &str, exclude_id: &str) -> Result<Vec<User>, AppError> {
        let users = match &self.backend {
            Backend::Firestore(db) => db.list_users().await?,
            Backend::Memory(db) => db.list_users(),
        };

        let needle = needle.to_lowercase();
        let mut matches: Vec<User> = users
            .into_iter()
            .filter(|u| u.id != exclude_id && u.email.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(matches)
    }

    // ─── Tokens ──────────────────────────────────────────────────

    pub async fn get_tokens(&self, user_id: &str) -> Result<Option<TokenBundle>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.get_tokens(user_id).await,
            Backend::Memory(db) => Ok(db.get_tokens(user_id)),
        }
    }

    pub async fn set_tokens(&self, user_id: &str, tokens: &TokenBundle) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.set_tokens(user_id, tokens).await,
            Backend::Memory(db) => {
                db.set_tokens(user_id, tokens);
                Ok(())
            }
        }
    }

    /// Persist a refreshed access token without touching other bundle fields.
    pub async fn update_access_token(
        &self,
        user_id: &str,
        access_token: &str,
        expiry_date: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(db) => {
                db.update_access_token(user_id, access_token, expiry_date, refresh_token)
                    .await
            }
            Backend::Memory(db) => {
                db.update_access_token(user_id, access_token, expiry_date, refresh_token);
                Ok(())
            }
        }
    }

    // ─── Events ──────────────────────────────────────────────────

    pub async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.insert_event(event).await,
            Backend::Memory(db) => {
                db.insert_event(event);
                Ok(())
            }
        }
    }

    /// Events of `owner_id` whose start or end lies in `[start, end]`, by start time.
    pub async fn events_in_window(
        &self,
        owner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.events_in_window(owner_id, start, end).await,
            Backend::Memory(db) => Ok(db.events_in_window(owner_id, start, end)),
        }
    }

    /// A page of events starting after `now`, plus the total number of matches.
    pub async fn upcoming_events(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
        tag: Option<&str>,
        offset: u32,
        limit: u32,
    ) -> Result<(Vec<Event>, u64), AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.upcoming_events(owner_id, now, tag, offset, limit).await,
            Backend::Memory(db) => Ok(db.upcoming_events(owner_id, now, tag, offset, limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_doc_id_is_path_safe() {
        let id = email_doc_id("first/last+tag@example.com");
        assert!(!id.contains('/'));
        assert!(!id.contains('+'));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_excludes_caller() {
        let db = Database::in_memory();
        let me = User::new("me@example.com".to_string(), "h".to_string());
        let alice = User::new("Alice@Example.com".to_string(), "h".to_string());
        let bob = User::new("bob@other.org".to_string(), "h".to_string());
        for u in [&me, &alice, &bob] {
            db.insert_user(u).await.unwrap();
        }

        let found = db.search_users("EXAMPLE", &me.id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, alice.id);

        // Regex metacharacters are matched literally.
        assert!(db.search_users(".*", &me.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_backend_reports_database_error() {
        let db = Database::offline();
        let err = db.get_user("anyone").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
