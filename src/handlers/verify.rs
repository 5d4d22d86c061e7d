use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::booking::BookingDetail;
use crate::models::scan::VerifyTicketInput;
use crate::services::{ScanOutcome, ScanVerifier};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::{error as error_response, rejected, success};

#[derive(Serialize)]
struct VerifiedTicket {
    #[serde(flatten)]
    booking: BookingDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    scanned_at: Option<DateTime<Utc>>,
}

/// POST /verify-ticket
///
/// Gate staff need three distinguishable answers: valid (admit), already
/// scanned (turn away, show when it was used), and everything else (not
/// found / not payable / cancelled).
pub async fn verify_ticket(
    State(state): State<AppState>,
    Json(input): Json<VerifyTicketInput>,
) -> AppResult<Response> {
    match ScanVerifier::verify(&state.pool, input.booking_id).await {
        Ok(ScanOutcome::Valid(booking)) => {
            let payload = VerifiedTicket {
                booking,
                scanned_at: None,
            };
            Ok(success(payload, "Ticket Valid").into_response())
        }
        Ok(ScanOutcome::AlreadyScanned {
            booking,
            scanned_at,
        }) => {
            let payload = VerifiedTicket {
                booking,
                scanned_at: Some(scanned_at),
            };
            Ok(rejected(payload, "Already Scanned").into_response())
        }
        Err(AppError::NotFound(_)) => Ok(error_response(
            "NOT_FOUND",
            "Ticket Not Found",
            None,
            StatusCode::NOT_FOUND,
        )),
        Err(other) => Err(other),
    }
}
