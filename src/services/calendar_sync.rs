// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push stored events to Google Calendar and read a user's live calendar.

use crate::error::AppError;
use crate::models::Event;
use crate::services::google::{
    Attendee, EventDateTime, GoogleClient, GoogleEvent, ReminderOverride, Reminders,
    PRIMARY_CALENDAR,
};
use crate::services::oauth::Credentials;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};

/// Popup reminder attached to every pushed event.
const REMINDER_MINUTES: u32 = 10;

/// Fields that only exist on the Google side of a pushed event.
#[derive(Debug, Clone, Default)]
pub struct EventExtras {
    pub location: Option<String>,
    pub description: Option<String>,
    pub attendees: Vec<String>,
}

#[derive(Clone)]
pub struct CalendarSync {
    google: GoogleClient,
}

impl CalendarSync {
    pub fn new(google: GoogleClient) -> Self {
        Self { google }
    }

    /// Insert `event` into the user's primary calendar. Returns Google's event ID.
    pub async fn push(
        &self,
        event: &Event,
        extras: &EventExtras,
        credentials: &Credentials,
    ) -> Result<String, AppError> {
        let body = to_google_event(event, extras);
        let inserted = self
            .google
            .insert_event(&credentials.access_token, PRIMARY_CALENDAR, &body)
            .await?;

        let google_id = inserted
            .id
            .ok_or_else(|| AppError::CalendarApi("Inserted event has no id".to_string()))?;

        tracing::info!(
            event_id = %event.id,
            google_event_id = %google_id,
            "Event pushed to Google Calendar"
        );
        Ok(google_id)
    }

    /// Events in the user's primary calendar between `start` and `end`. Never persisted.
    pub async fn pull(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        credentials: &Credentials,
    ) -> Result<Vec<GoogleEvent>, AppError> {
        let events = self
            .google
            .list_events(&credentials.access_token, PRIMARY_CALENDAR, start, end)
            .await?;
        tracing::debug!(user_id, count = events.len(), "Pulled Google Calendar events");
        Ok(events)
    }
}

/// Map a stored event onto Google's event schema.
pub fn to_google_event(event: &Event, extras: &EventExtras) -> GoogleEvent {
    let at = |t: DateTime<Utc>| EventDateTime {
        date_time: Some(format_utc_rfc3339(t)),
        date: None,
        time_zone: Some("UTC".to_string()),
    };

    let attendees = (!extras.attendees.is_empty()).then(|| {
        extras
            .attendees
            .iter()
            .map(|email| Attendee {
                email: email.clone(),
                extra: Default::default(),
            })
            .collect()
    });

    GoogleEvent {
        summary: Some(event.title.clone()),
        description: extras.description.clone(),
        location: extras.location.clone(),
        start: Some(at(event.start_time)),
        end: Some(at(event.end_time)),
        attendees,
        reminders: Some(Reminders {
            use_default: false,
            overrides: vec![ReminderOverride {
                method: "popup".to_string(),
                minutes: REMINDER_MINUTES,
            }],
        }),
        ..Default::default()
    }
}
