// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! OAuth state encoding/decoding tests.
//!
//! These tests verify that the signed state parameter survives a trip
//! through the consent URL and rejects anything it did not issue.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use shvasa_calendar::services::oauth::{sign_state, verify_state};

const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";
const NOW: i64 = 1_717_000_000_000;

#[test]
fn test_oauth_state_roundtrip() {
    let user_id = "5f2b8c1e-1c7a-4c55-9d0e-3b1b7c6a9f10";
    let state = sign_state(user_id, NOW, KEY).unwrap();

    assert_eq!(verify_state(&state, NOW, KEY), Some(user_id.to_string()));
}

#[test]
fn test_oauth_state_is_url_safe() {
    let state = sign_state("user-with-long-id-0000000000000000", NOW, KEY).unwrap();

    assert!(state
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    assert_eq!(urlencoding::encode(&state), state);
}

#[test]
fn test_oauth_state_expiry_window() {
    let state = sign_state("user-1", NOW, KEY).unwrap();
    let fifteen_minutes = 15 * 60 * 1000;

    assert!(verify_state(&state, NOW + fifteen_minutes - 1, KEY).is_some());
    assert!(verify_state(&state, NOW + fifteen_minutes + 1, KEY).is_none());
}

#[test]
fn test_oauth_state_from_the_future() {
    let state = sign_state("user-1", NOW, KEY).unwrap();

    // A little clock skew is tolerated, a lot is not.
    assert!(verify_state(&state, NOW - 30_000, KEY).is_some());
    assert!(verify_state(&state, NOW - 5 * 60_000, KEY).is_none());
}

#[test]
fn test_oauth_state_tampered_timestamp() {
    let state = sign_state("user-1", NOW, KEY).unwrap();
    let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&state).unwrap()).unwrap();

    let parts: Vec<&str> = decoded.splitn(3, '|').collect();
    let refreshed = format!("{}|{:x}|{}", parts[0], NOW + 3_600_000, parts[2]);

    assert!(verify_state(&URL_SAFE_NO_PAD.encode(refreshed), NOW + 3_600_000, KEY).is_none());
}

#[test]
fn test_oauth_state_decode_invalid() {
    for garbage in ["", "!!!", "bm90LXNpZ25lZA", "dXNlcnxmZnw"] {
        assert!(verify_state(garbage, NOW, KEY).is_none(), "{garbage:?}");
    }
}
