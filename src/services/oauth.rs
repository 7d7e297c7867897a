// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth token lifecycle: consent, code exchange, refresh-on-expiry.
//!
//! No credential object is shared between requests. Each caller gets
//! credentials built from the persisted bundle, and refreshes are
//! serialized per user so concurrent requests reuse one refreshed token.

use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::models::TokenBundle;
use crate::services::google::{GoogleClient, TokenResponse};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

type HmacSha256 = Hmac<Sha256>;

/// Margin before expiry at which an access token is treated as expired (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// How long a consent `state` stays acceptable.
const STATE_MAX_AGE_MS: i64 = 15 * 60 * 1000;

/// Tolerated clock skew for states stamped slightly in the future.
const STATE_MAX_SKEW_MS: i64 = 60 * 1000;

/// Shared per-user refresh locks.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Access token usable for Calendar API calls on behalf of one user.
#[derive(Clone)]
pub struct Credentials {
    pub access_token: String,
    pub expiry_date: DateTime<Utc>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

/// Outcome of [`GoogleOAuthService::ensure_live_credentials`].
#[derive(Debug)]
pub enum CredentialStatus {
    Live(Credentials),
    /// No token, no refresh token, or the refresh was rejected
    NeedsAuthorization,
    /// The user record is gone
    NeedsLogin,
}

#[derive(Clone)]
pub struct GoogleOAuthService {
    google: GoogleClient,
    db: Database,
    /// HMAC key for consent `state` values, derived from the session secret
    state_key: [u8; 32],
    refresh_locks: RefreshLocks,
}

impl GoogleOAuthService {
    pub fn new(config: &Config, google: GoogleClient, db: Database) -> Result<Self, AppError> {
        Ok(Self {
            google,
            db,
            state_key: derive_state_key(&config.jwt_signing_key)?,
            refresh_locks: Arc::new(DashMap::new()),
        })
    }

    // ─── Consent ─────────────────────────────────────────────────────────────

    /// Consent URL for `user_id`.
    pub fn begin_authorization(&self, user_id: &str) -> Result<String, AppError> {
        let state = sign_state(user_id, Utc::now().timestamp_millis(), &self.state_key)?;
        tracing::info!(user_id, "Starting Google OAuth flow");
        Ok(self.google.authorization_url(&state))
    }

    /// Verify `state`, exchange `code` and persist the grant.
    ///
    /// Returns the user the grant belongs to and the stored bundle.
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: &str,
    ) -> Result<(String, TokenBundle), AppError> {
        let user_id = verify_state(state, Utc::now().timestamp_millis(), &self.state_key)
            .ok_or_else(|| AppError::BadRequest("Invalid OAuth state".to_string()))?;

        let response = self.google.exchange_code(code).await?;

        // Held across read and write so a concurrent refresh cannot rotate the
        // refresh token in between and have it overwritten.
        let stored = {
            let lock = self.refresh_lock(&user_id);
            let _guard = lock.lock().await;
            self.store_grant(&user_id, &response).await
        };
        self.release_refresh_lock(&user_id);
        let bundle = stored?;

        tracing::info!(
            user_id = %user_id,
            has_refresh_token = bundle.refresh_token.is_some(),
            "Google tokens stored"
        );

        Ok((user_id, bundle))
    }

    async fn store_grant(
        &self,
        user_id: &str,
        response: &TokenResponse,
    ) -> Result<TokenBundle, AppError> {
        // Google omits the refresh token on repeat consent; keep the one we have.
        let refresh_token = match response.refresh_token.clone() {
            Some(rt) => Some(rt),
            None => self
                .db
                .get_tokens(user_id)
                .await?
                .and_then(|existing| existing.refresh_token),
        };

        let now = Utc::now();
        let bundle = TokenBundle {
            access_token: response.access_token.clone(),
            refresh_token,
            expiry_date: response.expiry_date(now),
            scope: response.scope.clone().unwrap_or_default(),
            updated_at: now,
        };

        self.db.set_tokens(user_id, &bundle).await?;
        Ok(bundle)
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Credentials for `user_id`, refreshing once if the access token is expiring.
    pub async fn ensure_live_credentials(
        &self,
        user_id: &str,
    ) -> Result<CredentialStatus, AppError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if self.db.get_user(user_id).await?.is_none() {
            return Ok(CredentialStatus::NeedsLogin);
        }

        match self.db.get_tokens(user_id).await? {
            None => return Ok(CredentialStatus::NeedsAuthorization),
            Some(bundle) if bundle.is_live(Utc::now(), margin) => {
                return Ok(CredentialStatus::Live(credentials_from(&bundle)));
            }
            Some(bundle) if bundle.refresh_token.is_none() => {
                return Ok(CredentialStatus::NeedsAuthorization);
            }
            Some(_) => {}
        }

        let status = {
            let lock = self.refresh_lock(user_id);
            let _guard = lock.lock().await;
            self.refresh_if_stale(user_id, margin).await
        };
        self.release_refresh_lock(user_id);
        status
    }

    /// Body of [`Self::ensure_live_credentials`] run under the user's refresh lock.
    async fn refresh_if_stale(
        &self,
        user_id: &str,
        margin: Duration,
    ) -> Result<CredentialStatus, AppError> {
        // Another request may have refreshed while we waited.
        let Some(bundle) = self.db.get_tokens(user_id).await? else {
            return Ok(CredentialStatus::NeedsAuthorization);
        };
        if bundle.is_live(Utc::now(), margin) {
            return Ok(CredentialStatus::Live(credentials_from(&bundle)));
        }
        let Some(refresh_token) = bundle.refresh_token else {
            return Ok(CredentialStatus::NeedsAuthorization);
        };

        tracing::info!(user_id, "Access token expired, refreshing");

        match self.refresh(user_id, &refresh_token).await {
            Ok(credentials) => Ok(CredentialStatus::Live(credentials)),
            Err(AppError::TokenRefresh(reason)) => {
                tracing::warn!(user_id, reason = %reason, "Token refresh rejected");
                Ok(CredentialStatus::NeedsAuthorization)
            }
            Err(e) => Err(e),
        }
    }

    fn refresh_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the user's lock entry once nobody else holds or waits on it.
    ///
    /// Clones are only taken under the map's shard lock, so a count of one
    /// seen here cannot race with a new waiter.
    fn release_refresh_lock(&self, user_id: &str) {
        self.refresh_locks
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of users with a live refresh lock entry.
    pub fn pending_refresh_locks(&self) -> usize {
        self.refresh_locks.len()
    }

    /// Refresh the access token and persist it. The stored refresh token is kept
    /// unless Google issued a new one.
    pub async fn refresh(
        &self,
        user_id: &str,
        refresh_token: &str,
    ) -> Result<Credentials, AppError> {
        let response = self.google.refresh_access_token(refresh_token).await?;
        let expiry_date = response.expiry_date(Utc::now());

        self.db
            .update_access_token(
                user_id,
                &response.access_token,
                expiry_date,
                response.refresh_token.as_deref(),
            )
            .await?;

        tracing::info!(user_id, "Token refreshed");

        Ok(Credentials {
            access_token: response.access_token,
            expiry_date,
        })
    }
}

fn credentials_from(bundle: &TokenBundle) -> Credentials {
    Credentials {
        access_token: bundle.access_token.clone(),
        expiry_date: bundle.expiry_date,
    }
}

fn derive_state_key(session_secret: &[u8]) -> Result<[u8; 32], AppError> {
    let mut key = [0u8; 32];
    Hkdf::<Sha256>::new(None, session_secret)
        .expand(b"oauth-state", &mut key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("State key derivation failed: {}", e)))?;
    Ok(key)
}

fn state_signature(payload: &str, key: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build `base64url("user_id|timestamp_hex|signature_hex")`.
pub fn sign_state(user_id: &str, now_ms: i64, key: &[u8]) -> Result<String, AppError> {
    let payload = format!("{}|{:x}", user_id, now_ms);
    let signature = state_signature(&payload, key)?;
    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Return the user ID in a `state` if the signature matches and it has not expired.
pub fn verify_state(state: &str, now_ms: i64, key: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;

    // User IDs are UUIDs, so they never contain the separator.
    let mut parts = decoded.splitn(3, '|');
    let (user_id, timestamp_hex, signature_hex) = (parts.next()?, parts.next()?, parts.next()?);
    if user_id.is_empty() {
        return None;
    }

    let expected = state_signature(&format!("{}|{}", user_id, timestamp_hex), key).ok()?;
    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        tracing::warn!("OAuth state signature mismatch");
        return None;
    }

    let issued_ms = i64::from_str_radix(timestamp_hex, 16).ok()?;
    let age = now_ms - issued_ms;
    if age > STATE_MAX_AGE_MS || age < -STATE_MAX_SKEW_MS {
        tracing::warn!(age_ms = age, "OAuth state expired");
        return None;
    }

    Some(user_id.to_string())
}
