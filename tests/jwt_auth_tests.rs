// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT session token tests.
//!
//! These tests verify that tokens issued at login can be decoded by the
//! session middleware, catching compatibility issues early.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use shvasa_calendar::middleware::auth::{create_jwt, verify_jwt, SESSION_TTL_SECS};

/// Claims structure that external consumers can rely on.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    iat: usize,
}

const KEY: &[u8] = b"test_signing_key_32_bytes_long!!";

#[test]
fn test_jwt_roundtrip() {
    let user_id = "5f2b8c1e-1c7a-4c55-9d0e-3b1b7c6a9f10";
    let token = create_jwt(user_id, KEY).expect("Failed to create JWT");

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(KEY),
        &Validation::new(Algorithm::HS256),
    )
    .expect("Failed to decode JWT - check Claims struct compatibility");

    assert_eq!(token_data.claims.sub, user_id);
    assert_eq!(
        token_data.claims.exp - token_data.claims.iat,
        SESSION_TTL_SECS as usize
    );
    assert_eq!(verify_jwt(&token, KEY).as_deref(), Some(user_id));
}

#[test]
fn test_jwt_only_hs256_accepted() {
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[derive(serde::Serialize)]
    struct Other {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = chrono::Utc::now().timestamp() as usize;
    let token = encode(
        &Header::new(Algorithm::HS512),
        &Other {
            sub: "user-1".to_string(),
            exp: now + 3600,
            iat: now,
        },
        &EncodingKey::from_secret(KEY),
    )
    .unwrap();

    assert!(verify_jwt(&token, KEY).is_none());
}

#[test]
fn test_jwt_expired_rejected() {
    let token = {
        #[derive(serde::Serialize)]
        struct Expired {
            sub: String,
            exp: usize,
            iat: usize,
        }
        let now = chrono::Utc::now().timestamp() as usize;
        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS256),
            &Expired {
                sub: "user-1".to_string(),
                exp: now - 3600,
                iat: now - 7200,
            },
            &jsonwebtoken::EncodingKey::from_secret(KEY),
        )
        .unwrap()
    };

    assert!(verify_jwt(&token, KEY).is_none());
}

#[test]
fn test_jwt_tampered_payload_rejected() {
    let token = create_jwt("user-1", KEY).unwrap();
    let mut parts: Vec<String> = token.split('.').map(String::from).collect();
    // Swap in the payload of a token for somebody else.
    let other = create_jwt("user-2", b"attacker_key").unwrap();
    parts[1] = other.split('.').nth(1).unwrap().to_string();

    assert!(verify_jwt(&parts.join("."), KEY).is_none());
}
