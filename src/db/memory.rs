// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store with the same semantics as the Firestore backend.
//!
//! Used for local development without GCP credentials and by the HTTP tests.

use crate::db::merge_window_results;
use crate::error::AppError;
use crate::models::{Event, TokenBundle, User};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
struct Collections {
    users: DashMap<String, User>,
    /// email -> user ID
    user_emails: DashMap<String, String>,
    tokens: DashMap<String, TokenBundle>,
    events: DashMap<String, Event>,
}

/// Shared in-memory store. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Collections>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: &User) -> Result<(), AppError> {
        // The entry guard holds the shard lock, making claim-then-insert atomic.
        match self.inner.user_emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AppError::UserExists),
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
                self.inner.users.insert(user.id.clone(), user.clone());
                Ok(())
            }
        }
    }

    pub fn get_user(&self, user_id: &str) -> Option<User> {
        self.inner.users.get(user_id).map(|u| u.clone())
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        let user_id = self.inner.user_emails.get(email)?.clone();
        self.get_user(&user_id)
    }

    pub fn list_users(&self) -> Vec<User> {
        self.inner.users.iter().map(|u| u.value().clone()).collect()
    }

    pub fn get_tokens(&self, user_id: &str) -> Option<TokenBundle> {
        self.inner.tokens.get(user_id).map(|t| t.clone())
    }

    pub fn set_tokens(&self, user_id: &str, tokens: &TokenBundle) {
        self.inner
            .tokens
            .insert(user_id.to_string(), tokens.clone());
    }

    pub fn update_access_token(
        &self,
        user_id: &str,
        access_token: &str,
        expiry_date: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) {
        let now = Utc::now();
        self.inner
            .tokens
            .entry(user_id.to_string())
            .and_modify(|bundle| {
                bundle.access_token = access_token.to_string();
                bundle.expiry_date = expiry_date;
                bundle.updated_at = now;
                if let Some(rt) = refresh_token {
                    bundle.refresh_token = Some(rt.to_string());
                }
            })
            .or_insert_with(|| TokenBundle {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.map(String::from),
                expiry_date,
                scope: String::new(),
                updated_at: now,
            });
    }

    pub fn insert_event(&self, event: &Event) {
        self.inner.events.insert(event.id.clone(), event.clone());
    }

    pub fn events_in_window(
        &self,
        owner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Event> {
        let matching: Vec<Event> = self
            .inner
            .events
            .iter()
            .filter(|e| e.created_by == owner_id && e.touches_window(start, end))
            .map(|e| e.value().clone())
            .collect();
        merge_window_results(matching, Vec::new())
    }

    pub fn upcoming_events(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
        tag: Option<&str>,
        offset: u32,
        limit: u32,
    ) -> (Vec<Event>, u64) {
        let mut matching: Vec<Event> = self
            .inner
            .events
            .iter()
            .filter(|e| e.created_by == owner_id && e.start_time > now)
            .filter(|e| tag.map_or(true, |t| e.tag.as_deref() == Some(t)))
            .map(|e| e.value().clone())
            .collect();

        matching.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        (page, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_duplicate_email_rejected() {
        let db = MemoryDb::new();
        let first = User::new("a@x.com".to_string(), "hash".to_string());
        let second = User::new("a@x.com".to_string(), "hash".to_string());

        db.insert_user(&first).unwrap();
        assert!(matches!(db.insert_user(&second), Err(AppError::UserExists)));
        assert_eq!(db.list_users().len(), 1);
    }

    #[test]
    fn test_email_lookup_is_case_sensitive() {
        let db = MemoryDb::new();
        let user = User::new("A@x.com".to_string(), "hash".to_string());
        db.insert_user(&user).unwrap();

        assert!(db.find_user_by_email("A@x.com").is_some());
        assert!(db.find_user_by_email("a@x.com").is_none());
    }

    #[test]
    fn test_refresh_update_keeps_refresh_token() {
        let db = MemoryDb::new();
        let now = Utc::now();
        db.set_tokens(
            "u1",
            &TokenBundle {
                access_token: "old".to_string(),
                refresh_token: Some("refresh".to_string()),
                expiry_date: now,
                scope: "calendar".to_string(),
                updated_at: now,
            },
        );

        db.update_access_token("u1", "new", now + Duration::hours(1), None);

        let stored = db.get_tokens("u1").unwrap();
        assert_eq!(stored.access_token, "new");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(stored.scope, "calendar");
        assert_eq!(stored.expiry_date, now + Duration::hours(1));
    }

    #[test]
    fn test_upcoming_pages_and_tag_filter() {
        let db = MemoryDb::new();
        let now = Utc::now();
        for i in 0..13 {
            let start = now + Duration::hours(i + 1);
            let tag = if i % 2 == 0 { Some("work".to_string()) } else { None };
            db.insert_event(&Event::new("u1", format!("e{i}"), start, start, tag));
        }
        // past and foreign events never show up
        db.insert_event(&Event::new("u1", "past".into(), now - Duration::hours(1), now, None));
        db.insert_event(&Event::new("u2", "other".into(), now + Duration::hours(1), now, None));

        let (page, total) = db.upcoming_events("u1", now, None, 10, 10);
        assert_eq!(total, 13);
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].title, "e10");

        let (work, work_total) = db.upcoming_events("u1", now, Some("work"), 0, 10);
        assert_eq!(work_total, 7);
        assert!(work.iter().all(|e| e.tag.as_deref() == Some("work")));
    }
}
