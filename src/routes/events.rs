// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event routes: local CRUD, listing and Google Calendar sync.

use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::AuthUser;
use crate::models::event::{total_pages, UPCOMING_PAGE_SIZE};
use crate::models::Event;
use crate::services::{CredentialStatus, EventExtras, GoogleEvent};
use crate::time_utils::rfc3339;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/createEvent", post(create_event))
        .route("/getWeeklyEvents", post(get_weekly_events))
        .route("/getUpcomingEvents", post(get_upcoming_events))
        .route("/events", post(get_google_events))
}

// ─── Request / response types ────────────────────────────────────────────────

/// Attendees may be sent as bare emails or as Google-style `{ "email": ... }` objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AttendeeInput {
    Email(String),
    Object { email: String },
}

impl AttendeeInput {
    fn into_email(self) -> String {
        match self {
            AttendeeInput::Email(email) | AttendeeInput::Object { email } => email,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Title is required."))]
    title: String,
    #[serde(with = "rfc3339")]
    start_time: DateTime<Utc>,
    #[serde(with = "rfc3339")]
    end_time: DateTime<Utc>,
    #[serde(default)]
    tag: Option<String>,
    /// Also insert the event into the user's Google Calendar
    #[serde(default)]
    sync: bool,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    attendees: Vec<AttendeeInput>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateEventResponse {
    pub message: String,
    /// The stored event. Present even when sync failed, since the save committed.
    pub event: Event,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_event_id: Option<String>,
    /// Sync failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyEventsRequest {
    #[serde(with = "rfc3339")]
    start_date: DateTime<Utc>,
    #[serde(with = "rfc3339")]
    end_date: DateTime<Utc>,
    /// View another user's calendar (shared calendars)
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WeeklyEventsResponse {
    pub message: String,
    pub event: Vec<Event>,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpcomingEventsRequest {
    #[serde(default = "first_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    page: u32,
    /// Exact tag to match
    #[serde(default)]
    filter: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UpcomingEventsResponse {
    pub events: Vec<Event>,
    pub total_pages: u64,
    pub total_events: u64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventsRequest {
    #[serde(with = "rfc3339")]
    start_date: DateTime<Utc>,
    #[serde(with = "rfc3339")]
    end_date: DateTime<Utc>,
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// Save an event, then optionally push it to Google Calendar.
///
/// The local save is committed first; a failed push is reported in the same
/// response and does not undo it.
async fn create_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateEventRequest>,
) -> Result<(StatusCode, Json<CreateEventResponse>)> {
    let event = Event::new(
        &user.user_id,
        body.title,
        body.start_time,
        body.end_time,
        body.tag.filter(|t| !t.is_empty()),
    );
    state.db.insert_event(&event).await?;

    tracing::info!(user_id = %user.user_id, event_id = %event.id, "Event created");

    if !body.sync {
        return Ok(created(event, None));
    }

    let extras = EventExtras {
        location: body.location.filter(|s| !s.is_empty()),
        description: body.description.filter(|s| !s.is_empty()),
        attendees: body
            .attendees
            .into_iter()
            .map(AttendeeInput::into_email)
            .collect(),
    };

    let credentials = match state.oauth.ensure_live_credentials(&user.user_id).await {
        Ok(CredentialStatus::Live(credentials)) => credentials,
        Ok(CredentialStatus::NeedsAuthorization) => return Ok(not_linked(event)),
        Ok(CredentialStatus::NeedsLogin) => return Err(AppError::NotLoggedIn),
        Err(e) => return Ok(sync_failed(event, &e)),
    };

    match state.calendar.push(&event, &extras, &credentials).await {
        Ok(google_id) => Ok(created(event, Some(google_id))),
        Err(e) if e.needs_authorization() => Ok(not_linked(event)),
        Err(e) => Ok(sync_failed(event, &e)),
    }
}

fn created(event: Event, google_event_id: Option<String>) -> (StatusCode, Json<CreateEventResponse>) {
    (
        StatusCode::CREATED,
        Json(CreateEventResponse {
            message: "Event created successfully".to_string(),
            event,
            google_event_id,
            error: None,
        }),
    )
}

fn not_linked(event: Event) -> (StatusCode, Json<CreateEventResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(CreateEventResponse {
            message: "User is not authenticated.".to_string(),
            event,
            google_event_id: None,
            error: None,
        }),
    )
}

fn sync_failed(event: Event, err: &AppError) -> (StatusCode, Json<CreateEventResponse>) {
    tracing::error!(event_id = %event.id, error = %err, "Error syncing to Google Calendar");

    let detail = match err {
        AppError::CalendarApi(msg) => msg.clone(),
        other => other.public_message(),
    };

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(CreateEventResponse {
            message: "Error syncing to Google Calendar.".to_string(),
            event,
            google_event_id: None,
            error: Some(detail),
        }),
    )
}

/// Events whose start or end falls inside the window.
async fn get_weekly_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<WeeklyEventsRequest>,
) -> Result<Json<WeeklyEventsResponse>> {
    let owner = body
        .user_id
        .filter(|id| !id.is_empty())
        .unwrap_or(user.user_id);

    let events = state
        .db
        .events_in_window(&owner, body.start_date, body.end_date)
        .await?;

    tracing::debug!(owner = %owner, count = events.len(), "Weekly events fetched");

    Ok(Json(WeeklyEventsResponse {
        message: "Events fetched successfully".to_string(),
        event: events,
    }))
}

/// Future events, ten per page, optionally filtered by tag.
async fn get_upcoming_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpcomingEventsRequest>,
) -> Result<Json<UpcomingEventsResponse>> {
    let offset = (body.page - 1).saturating_mul(UPCOMING_PAGE_SIZE);
    let tag = body.filter.as_deref().filter(|t| !t.is_empty());

    let (events, total_events) = state
        .db
        .upcoming_events(&user.user_id, Utc::now(), tag, offset, UPCOMING_PAGE_SIZE)
        .await?;

    Ok(Json(UpcomingEventsResponse {
        events,
        total_pages: total_pages(total_events, UPCOMING_PAGE_SIZE),
        total_events,
    }))
}

/// Live read of the user's Google Calendar.
async fn get_google_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<GoogleEventsRequest>,
) -> Result<Json<Vec<GoogleEvent>>> {
    let credentials = match state.oauth.ensure_live_credentials(&user.user_id).await? {
        CredentialStatus::Live(credentials) => credentials,
        CredentialStatus::NeedsAuthorization => return Err(AppError::CalendarNotLinked),
        CredentialStatus::NeedsLogin => return Err(AppError::NotLoggedIn),
    };

    let events = state
        .calendar
        .pull(&user.user_id, body.start_date, body.end_date, &credentials)
        .await?;

    Ok(Json(events))
}
