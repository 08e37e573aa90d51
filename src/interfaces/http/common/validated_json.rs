//! `Json<T>` plus `validator` checks
//!
//! Malformed JSON is rejected with 400; a body that parses but fails
//! `Validate` is rejected with 422 listing every failing field.

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use super::ApiError;

pub struct ValidatedJson<T>(pub T);

fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: {}", field, e.code),
            })
        })
        .collect();
    fields.sort();

    if fields.is_empty() {
        "Validation failed".to_string()
    } else {
        fields.join("; ")
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(format!("Invalid JSON: {}", rejection)))?;

        value
            .validate()
            .map_err(|errors| ApiError::unprocessable(describe(&errors)))?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, Validate)]
    struct Booking {
        #[validate(length(min = 1, max = 20))]
        guest: String,
        #[validate(range(min = 0))]
        amount_minor: i64,
    }

    async fn handler(ValidatedJson(body): ValidatedJson<Booking>) -> String {
        format!("{}:{}", body.guest, body.amount_minor)
    }

    async fn post_json(body: &str) -> StatusCode {
        let app = Router::new().route("/book", post(handler));
        let req = Request::builder()
            .method("POST")
            .uri("/book")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn accepts_valid_body() {
        assert_eq!(
            post_json(r#"{"guest":"Ayse","amount_minor":1000}"#).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        assert_eq!(post_json("{guest").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failing_rules_are_unprocessable() {
        assert_eq!(
            post_json(r#"{"guest":"","amount_minor":-1}"#).await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
