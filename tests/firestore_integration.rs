// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST set). They are skipped otherwise.
//!
//! Every test uses fresh IDs and emails, so runs against a shared emulator
//! do not interfere with each other.

use chrono::{Duration, TimeZone, Utc};
use shvasa_calendar::error::AppError;
use shvasa_calendar::models::{Event, TokenBundle, User};

mod common;
use common::test_db;

fn unique_email(prefix: &str) -> String {
    format!("{}+{}@example.com", prefix, uuid::Uuid::new_v4())
}

fn test_user(prefix: &str) -> User {
    User::new(unique_email(prefix), "$argon2id$test-hash".to_string())
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_creation_and_lookup() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user("create");

    assert!(db.get_user(&user.id).await.unwrap().is_none());

    db.insert_user(&user).await.unwrap();

    let by_id = db.get_user(&user.id).await.unwrap().expect("user by id");
    assert_eq!(by_id.email, user.email);
    assert_eq!(by_id.password_hash, user.password_hash);

    let by_email = db
        .find_user_by_email(&user.email)
        .await
        .unwrap()
        .expect("user by email");
    assert_eq!(by_email.id, user.id);

    // Lookup is exact.
    assert!(db
        .find_user_by_email(&user.email.to_uppercase())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    require_emulator!();

    let db = test_db().await;
    let first = test_user("dup");
    let second = User::new(first.email.clone(), "$argon2id$other".to_string());

    db.insert_user(&first).await.unwrap();
    let err = db.insert_user(&second).await.unwrap_err();

    assert!(matches!(err, AppError::UserExists));
    assert!(db.get_user(&second.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_signups_one_winner() {
    require_emulator!();

    let db = test_db().await;
    let email = unique_email("race");

    let attempts: Vec<_> = (0..5)
        .map(|_| {
            let db = db.clone();
            let user = User::new(email.clone(), "$argon2id$h".to_string());
            tokio::spawn(async move { db.insert_user(&user).await })
        })
        .collect();

    let mut winners = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(()) => winners += 1,
            Err(AppError::UserExists) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_search_users_excludes_caller() {
    require_emulator!();

    let db = test_db().await;
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let me = User::new(format!("me.{tag}@example.com"), "h".to_string());
    let other = User::new(format!("other.{tag}@example.com"), "h".to_string());
    db.insert_user(&me).await.unwrap();
    db.insert_user(&other).await.unwrap();

    let found = db.search_users(&tag.to_uppercase(), &me.id).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, other.id);
}

// ═══════════════════════════════════════════════════════════════════════════
// TOKEN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_token_refresh_update_keeps_other_fields() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user("tokens");
    db.insert_user(&user).await.unwrap();

    let now = Utc::now();
    let bundle = TokenBundle {
        access_token: "ya29.first".to_string(),
        refresh_token: Some("1//keep-me".to_string()),
        expiry_date: now,
        scope: "https://www.googleapis.com/auth/calendar.events".to_string(),
        updated_at: now,
    };
    db.set_tokens(&user.id, &bundle).await.unwrap();

    let new_expiry = now + Duration::hours(1);
    db.update_access_token(&user.id, "ya29.second", new_expiry, None)
        .await
        .unwrap();

    let stored = db.get_tokens(&user.id).await.unwrap().expect("tokens");
    assert_eq!(stored.access_token, "ya29.second");
    assert_eq!(stored.refresh_token.as_deref(), Some("1//keep-me"));
    assert_eq!(stored.scope, bundle.scope);
    assert_eq!(
        stored.expiry_date.timestamp_millis(),
        new_expiry.timestamp_millis()
    );
}

#[tokio::test]
async fn test_token_refresh_update_stores_rotated_refresh_token() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user("rotate");
    db.insert_user(&user).await.unwrap();

    let now = Utc::now();
    let bundle = TokenBundle {
        access_token: "ya29.first".to_string(),
        refresh_token: Some("1//old".to_string()),
        expiry_date: now,
        scope: String::new(),
        updated_at: now,
    };
    db.set_tokens(&user.id, &bundle).await.unwrap();

    db.update_access_token(&user.id, "ya29.second", now + Duration::hours(1), Some("1//new"))
        .await
        .unwrap();

    let stored = db.get_tokens(&user.id).await.unwrap().expect("tokens");
    assert_eq!(stored.access_token, "ya29.second");
    assert_eq!(stored.refresh_token.as_deref(), Some("1//new"));
}

// ═══════════════════════════════════════════════════════════════════════════
// EVENT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_events_in_window() {
    require_emulator!();

    let db = test_db().await;
    let owner = uuid::Uuid::new_v4().to_string();
    let at = |h: u32| Utc.with_ymd_and_hms(2024, 3, 4, h, 0, 0).unwrap();

    let inside_both = Event::new(&owner, "both".to_string(), at(9), at(10), None);
    let ends_inside = Event::new(&owner, "end".to_string(), at(6), at(8), None);
    let outside = Event::new(&owner, "outside".to_string(), at(13), at(14), None);
    let other_owner = Event::new("someone-else", "theirs".to_string(), at(9), at(10), None);

    for event in [&inside_both, &ends_inside, &outside, &other_owner] {
        db.insert_event(event).await.unwrap();
    }

    let found = db.events_in_window(&owner, at(8), at(12)).await.unwrap();
    let titles: Vec<&str> = found.iter().map(|e| e.title.as_str()).collect();

    // The event matching on both endpoints appears once.
    assert_eq!(titles, vec!["end", "both"]);
}

#[tokio::test]
async fn test_upcoming_events_page_and_count() {
    require_emulator!();

    let db = test_db().await;
    let owner = uuid::Uuid::new_v4().to_string();
    let base = Utc::now() + Duration::days(1);

    for i in 0..12 {
        let start = base + Duration::hours(i);
        let tag = if i % 2 == 0 { "even" } else { "odd" };
        let event = Event::new(
            &owner,
            format!("e{i:02}"),
            start,
            start + Duration::minutes(30),
            Some(tag.to_string()),
        );
        db.insert_event(&event).await.unwrap();
    }

    let (page, total) = db
        .upcoming_events(&owner, Utc::now(), None, 10, 10)
        .await
        .unwrap();
    assert_eq!(total, 12);
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].title, "e10");

    let (tagged, tagged_total) = db
        .upcoming_events(&owner, Utc::now(), Some("odd"), 0, 10)
        .await
        .unwrap();
    assert_eq!(tagged_total, 6);
    assert!(tagged.iter().all(|e| e.tag.as_deref() == Some("odd")));
}
