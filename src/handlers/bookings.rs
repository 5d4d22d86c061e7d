use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::booking::CreateBookingInput;
use crate::services::BookingEngine;
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::response::{created, success};

pub async fn create_booking(
    State(state): State<AppState>,
    Json(input): Json<CreateBookingInput>,
) -> AppResult<Response> {
    let booking = BookingEngine::create(&state.pool, &state.config, input).await?;
    Ok(created(booking, "Booking created").into_response())
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let booking = BookingEngine::get(&state.pool, id).await?;
    Ok(success(booking, "Booking retrieved").into_response())
}

#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub purchaser_id: String,
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> AppResult<Response> {
    let bookings = BookingEngine::list_for_purchaser(&state.pool, &query.purchaser_id).await?;
    Ok(success(bookings, "Bookings retrieved").into_response())
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let booking = BookingEngine::cancel(&state.pool, id).await?;
    Ok(success(booking, "Booking cancelled").into_response())
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let booking = BookingEngine::confirm_payment(&state.pool, id).await?;
    Ok(success(booking, "Payment confirmed").into_response())
}

pub async fn expire_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let booking = BookingEngine::expire(&state.pool, id).await?;
    Ok(success(booking, "Booking expired").into_response())
}
