// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users and their email uniqueness claims
//! - Google token bundles
//! - Calendar events

use crate::db::{collections, email_doc_id, fields, merge_window_results};
use crate::error::AppError;
use crate::models::{EmailClaim, Event, TokenBundle, User};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::select_filter_builder::FirestoreQueryFilterBuilder;
use serde::{Deserialize, Serialize};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Fields written by a token refresh. Anything else in the stored bundle is untouched.
#[derive(Debug, Serialize, Deserialize)]
struct RefreshedAccessToken {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(with = "crate::time_utils::rfc3339")]
    expiry_date: DateTime<Utc>,
    #[serde(with = "crate::time_utils::rfc3339")]
    updated_at: DateTime<Utc>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation returns a database error.
    pub fn new_offline() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Insert a new user, claiming its email first.
    ///
    /// The claim document is created with insert semantics, so of two concurrent
    /// signups for one email exactly one wins; the loser gets `UserExists`.
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let client = self.get_client()?;
        let email_key = email_doc_id(&user.email);
        let claim = EmailClaim {
            user_id: user.id.clone(),
        };

        let claimed = client
            .fluent()
            .insert()
            .into(collections::USER_EMAILS)
            .document_id(&email_key)
            .object(&claim)
            .execute::<EmailClaim>()
            .await;

        match claimed {
            Ok(_) => {}
            Err(FirestoreError::DataConflictError(_)) => return Err(AppError::UserExists),
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        let inserted = client
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute::<User>()
            .await;

        if let Err(e) = inserted {
            // Release the claim so the email is not locked out forever.
            if let Err(cleanup) = client
                .fluent()
                .delete()
                .from(collections::USER_EMAILS)
                .document_id(&email_key)
                .execute()
                .await
            {
                tracing::error!(error = %cleanup, "Failed to release email claim");
            }
            return Err(AppError::Database(e.to_string()));
        }

        Ok(())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Look a user up by exact email via its claim document.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let claim: Option<EmailClaim> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&email_doc_id(email))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match claim {
            Some(claim) => self.get_user(&claim.user_id).await,
            None => Ok(None),
        }
    }

    /// All users. Firestore has no substring operator, so search filters in process.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get the Google token bundle for a user.
    pub async fn get_tokens(&self, user_id: &str) -> Result<Option<TokenBundle>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOKENS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace the token bundle for a user (initial grant).
    pub async fn set_tokens(&self, user_id: &str, tokens: &TokenBundle) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::TOKENS)
            .document_id(user_id)
            .object(tokens)
            .execute::<TokenBundle>()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write a refreshed access token using a field mask.
    ///
    /// The stored refresh token is only replaced when Google issued a new one.
    pub async fn update_access_token(
        &self,
        user_id: &str,
        access_token: &str,
        expiry_date: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) -> Result<(), AppError> {
        let mut mask = vec![
            fields::ACCESS_TOKEN,
            fields::EXPIRY_DATE,
            fields::UPDATED_AT,
        ];
        if refresh_token.is_some() {
            mask.push(fields::REFRESH_TOKEN);
        }

        let patch = RefreshedAccessToken {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expiry_date,
            updated_at: Utc::now(),
        };

        self.get_client()?
            .fluent()
            .update()
            .fields(mask)
            .in_col(collections::TOKENS)
            .document_id(user_id)
            .object(&patch)
            .execute::<TokenBundle>()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Event Operations ────────────────────────────────────────

    /// Store a new event.
    pub async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .insert()
            .into(collections::EVENTS)
            .document_id(&event.id)
            .object(event)
            .execute::<Event>()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Events of `owner_id` whose start or end falls in `[start, end]`.
    ///
    /// Runs one range query per endpoint and merges, avoiding an OR filter.
    pub async fn events_in_window(
        &self,
        owner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, AppError> {
        let start = format_utc_rfc3339(start);
        let end = format_utc_rfc3339(end);

        let (by_start, by_end) = futures_util::future::try_join(
            self.events_with_field_in_range(owner_id, fields::START_TIME, &start, &end),
            self.events_with_field_in_range(owner_id, fields::END_TIME, &start, &end),
        )
        .await?;

        Ok(merge_window_results(by_start, by_end))
    }

    async fn events_with_field_in_range(
        &self,
        owner_id: &str,
        field: &'static str,
        start: &str,
        end: &str,
    ) -> Result<Vec<Event>, AppError> {
        let owner_id = owner_id.to_string();
        let start = start.to_string();
        let end = end.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::EVENTS)
            .filter(move |q| {
                q.for_all([
                    q.field(fields::CREATED_BY).eq(owner_id.clone()),
                    q.field(field).greater_than_or_equal(start.clone()),
                    q.field(field).less_than_or_equal(end.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// One page of future events (ordered by start time) plus the total match count.
    pub async fn upcoming_events(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
        tag: Option<&str>,
        offset: u32,
        limit: u32,
    ) -> Result<(Vec<Event>, u64), AppError> {
        let client = self.get_client()?;
        let now = format_utc_rfc3339(now);

        let page_filter = {
            let (owner_id, now, tag) = (owner_id.to_string(), now.clone(), tag.map(String::from));
            move |q: FirestoreQueryFilterBuilder| {
                q.for_all([
                    q.field(fields::CREATED_BY).eq(owner_id.clone()),
                    q.field(fields::START_TIME).greater_than(now.clone()),
                    tag.clone().and_then(|t| q.field(fields::TAG).eq(t)),
                ])
            }
        };
        let count_filter = page_filter.clone();

        let page: Vec<Event> = client
            .fluent()
            .select()
            .from(collections::EVENTS)
            .filter(page_filter)
            .order_by([
                (fields::START_TIME, firestore::FirestoreQueryDirection::Ascending),
            ])
            .offset(offset)
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Count by reading every match. Per-user volumes are small.
        let all: Vec<Event> = client
            .fluent()
            .select()
            .from(collections::EVENTS)
            .filter(count_filter)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((page, all.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_refresh_patch_omits_absent_refresh_token() {
        let patch = RefreshedAccessToken {
            access_token: "ya29.fresh".to_string(),
            refresh_token: None,
            expiry_date: Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
        };

        let json = serde_json::to_value(&patch).unwrap();
        assert!(json.get(fields::REFRESH_TOKEN).is_none());
        assert_eq!(json[fields::ACCESS_TOKEN], "ya29.fresh");
        assert_eq!(json[fields::EXPIRY_DATE], "2024-03-04T10:00:00.000Z");

        let back: RefreshedAccessToken = serde_json::from_value(json).unwrap();
        assert!(back.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_offline_update_reports_database_error() {
        let db = FirestoreDb::new_offline();
        let err = db
            .update_access_token("user-1", "ya29", Utc::now(), Some("1//rt"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
