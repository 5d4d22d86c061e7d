use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::models::event::{CreateEventInput, UpdateEventInput};
use crate::services::Inventory;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::{created, empty_success, success};

pub async fn create_event(
    State(state): State<AppState>,
    Json(input): Json<CreateEventInput>,
) -> AppResult<Response> {
    let event = Inventory::create_event(&state.pool, input).await?;
    Ok(created(event, "Event created").into_response())
}

pub async fn list_events(State(state): State<AppState>) -> AppResult<Response> {
    let events = Inventory::list_events(&state.pool).await?;
    Ok(success(events, "Events retrieved").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> AppResult<Response> {
    let event = Inventory::get_event(&state.pool, &id_or_slug).await?;
    Ok(success(event, "Event retrieved").into_response())
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateEventInput>,
) -> AppResult<Response> {
    let id = parse_event_id(&id)?;
    let event = Inventory::update_event(&state.pool, id, input).await?;
    Ok(success(event, "Event updated").into_response())
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_event_id(&id)?;
    Inventory::delete_event(&state.pool, id).await?;
    Ok(empty_success("Event deleted").into_response())
}

// Mutations address events by id only; the slug shorthand is read-only.
fn parse_event_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse::<Uuid>()
        .map_err(|_| AppError::ValidationError(format!("'{raw}' is not a valid event id")))
}
