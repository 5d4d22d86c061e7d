use axum::{
    routing::{get, post},
    Router,
};

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{bookings, events, health_check, verify};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(events::create_event).get(events::list_events))
        .route(
            "/events/:id_or_slug",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route(
            "/bookings/:id/confirm-payment",
            post(bookings::confirm_payment),
        )
        .route("/bookings/:id/expire", post(bookings::expire_booking))
        .route("/verify-ticket", post(verify::verify_ticket))
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
