// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod calendar_sync;
pub mod google;
pub mod oauth;
pub mod password;

pub use calendar_sync::{CalendarSync, EventExtras};
pub use google::{GoogleClient, GoogleEvent};
pub use oauth::{CredentialStatus, Credentials, GoogleOAuthService};
