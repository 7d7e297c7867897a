// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request extractors.

use crate::error::AppError;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

/// JSON body that has passed its `validator` rules.
///
/// Malformed JSON, wrong content type and failed rules all reject with 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| AppError::BadRequest(first_message(&errors)))?;

        Ok(Self(value))
    }
}

/// The first custom message among the field errors, sorted by field name.
fn first_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .iter()
        .flat_map(|(_, errs)| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request body".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::{routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize, Validate)]
    struct Body1 {
        #[validate(length(min = 1, message = "name is required"))]
        name: String,
    }

    async fn handler(ValidatedJson(body): ValidatedJson<Body1>) -> impl IntoResponse {
        body.name
    }

    async fn send(body: &'static str) -> StatusCode {
        Router::new()
            .route("/", post(handler))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_valid_body_passes() {
        assert_eq!(send(r#"{"name":"x"}"#).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rule_failure_and_bad_json_are_400() {
        assert_eq!(send(r#"{"name":""}"#).await, StatusCode::BAD_REQUEST);
        assert_eq!(send(r#"{"name":"#).await, StatusCode::BAD_REQUEST);
        assert_eq!(send(r#"{}"#).await, StatusCode::BAD_REQUEST);
    }
}
