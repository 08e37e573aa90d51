//! Domain error → HTTP response mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use super::ApiResponse;
use crate::domain::DomainError;

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Error returned by every handler; rendered in the standard envelope
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

/// Parse an enum sent as its wire string, 422 on anything else
pub fn parse_field<T>(field: &str, raw: &str, parse: fn(&str) -> Option<T>) -> Result<T, ApiError> {
    parse(raw.trim())
        .ok_or_else(|| ApiError::unprocessable(format!("{}: unknown value '{}'", field, raw)))
}

pub fn status_for(e: &DomainError) -> StatusCode {
    match e {
        DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::InvalidTransition { .. }
        | DomainError::InvalidState(_)
        | DomainError::Conflict(_)
        | DomainError::AlreadySettled { .. } => StatusCode::CONFLICT,
        DomainError::Unauthorized(_) => StatusCode::FORBIDDEN,
        DomainError::Provider { .. } => StatusCode::BAD_GATEWAY,
        DomainError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        let status = status_for(&e);
        let message = match &e {
            DomainError::Provider {
                reconciliation_required: true,
                ..
            } => format!("{} (reconciliation required before retrying)", e),
            // storage details stay in the logs
            DomainError::Repository(_) => "Internal storage error".to_string(),
            _ => e.to_string(),
        };
        if status.is_server_error() {
            error!(error = %e, status = status.as_u16(), "Request failed");
        } else if status == StatusCode::FORBIDDEN {
            warn!(error = %e, "Access denied");
        }
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_status_codes() {
        let cases = [
            (DomainError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::not_found("Reservation", "r1"), StatusCode::NOT_FOUND),
            (DomainError::Conflict("slot".into()), StatusCode::CONFLICT),
            (
                DomainError::AlreadySettled {
                    payment_id: "p".into(),
                },
                StatusCode::CONFLICT,
            ),
            (DomainError::Unauthorized("other tenant".into()), StatusCode::FORBIDDEN),
            (
                DomainError::Provider {
                    message: "timeout".into(),
                    reconciliation_required: true,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (DomainError::Repository("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status, expected);
        }
    }

    #[test]
    fn unknown_enum_value_is_unprocessable() {
        use crate::domain::ReservationStatus;
        assert_eq!(
            parse_field("status", " active", ReservationStatus::parse).unwrap(),
            ReservationStatus::Active
        );
        let err = parse_field("status", "open", ReservationStatus::parse).unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn repository_details_are_not_leaked() {
        let e = ApiError::from(DomainError::Repository("Database error: table locked".into()));
        assert_eq!(e.message, "Internal storage error");
    }
}
