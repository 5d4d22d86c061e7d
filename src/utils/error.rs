use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::utils::response::error as error_response;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Insufficient availability for ticket type {ticket_type_id}: requested {requested}, available {available}")]
    InsufficientAvailability {
        ticket_type_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage unavailable")]
    Unavailable(#[from] sqlx::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientAvailability { .. } => StatusCode::CONFLICT,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientAvailability { .. } => "INSUFFICIENT_AVAILABILITY",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Unavailable(_) => "UNAVAILABLE",
        }
    }

    fn log(&self) {
        match self {
            AppError::Unavailable(e) => {
                error!(error = ?e, "Storage error");
            }
            AppError::InsufficientAvailability {
                ticket_type_id,
                requested,
                available,
            } => {
                warn!(
                    ticket_type_id = %ticket_type_id,
                    requested,
                    available,
                    "Reservation rejected: insufficient availability"
                );
            }
            other => {
                warn!(error = ?other, "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Storage internals stay out of the API response.
        let public_message = match &self {
            AppError::Unavailable(_) => "Service temporarily unavailable".to_string(),
            other => other.to_string(),
        };

        let details = match &self {
            AppError::InsufficientAvailability {
                ticket_type_id,
                requested,
                available,
            } => Some(json!({
                "ticket_type_id": ticket_type_id,
                "requested": requested,
                "available": available,
            })),
            _ => None,
        };

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            AppError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InsufficientAvailability {
                ticket_type_id: Uuid::nil(),
                requested: 3,
                available: 2,
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Unavailable(sqlx::Error::PoolClosed).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn insufficient_availability_names_the_shortfall() {
        let err = AppError::InsufficientAvailability {
            ticket_type_id: Uuid::nil(),
            requested: 3,
            available: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("requested 3"));
        assert!(msg.contains("available 2"));
    }
}
