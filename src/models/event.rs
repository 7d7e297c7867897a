// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar event model for storage and API.

use crate::time_utils::rfc3339;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Page size for the upcoming-events listing.
pub const UPCOMING_PAGE_SIZE: u32 = 10;

/// Stored event record in the `events` collection.
///
/// `start_time <= end_time` is not enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Event {
    /// Event ID (also used as document ID)
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(with = "rfc3339")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_time: DateTime<Utc>,
    #[serde(with = "rfc3339")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub end_time: DateTime<Utc>,
    /// Free-form label used by the upcoming-events filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Owner user ID
    pub created_by: String,
    #[serde(with = "rfc3339")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        owner_id: &str,
        title: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        tag: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            start_time,
            end_time,
            tag,
            created_by: owner_id.to_string(),
            created_at: Utc::now(),
        }
    }

    /// True if the start or the end lies inside `[start, end]`.
    pub fn touches_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let within = |t: DateTime<Utc>| t >= start && t <= end;
        within(self.start_time) || within(self.end_time)
    }
}

/// Number of pages needed for `total` items.
pub fn total_pages(total: u64, page_size: u32) -> u64 {
    total.div_ceil(page_size as u64)
}
