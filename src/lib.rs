// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Shvasa Calendar: calendar backend with Google Calendar sync
//!
//! This crate provides the REST API for email/password accounts, locally
//! stored events, and mirroring those events to a user's Google Calendar.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use error::AppError;
use services::{CalendarSync, GoogleClient, GoogleOAuthService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub oauth: GoogleOAuthService,
    pub calendar: CalendarSync,
}

impl AppState {
    /// Wire up services around an already-connected database.
    pub fn new(config: Config, db: Database) -> Result<Self, AppError> {
        let google = GoogleClient::new(&config)?;
        let oauth = GoogleOAuthService::new(&config, google.clone(), db.clone())?;
        let calendar = CalendarSync::new(google);

        Ok(Self {
            config,
            db,
            oauth,
            calendar,
        })
    }
}
