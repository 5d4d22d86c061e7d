use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub category: String,
    pub starts_at: DateTime<Utc>,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub template_availability: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShowTime {
    pub id: Uuid,
    pub event_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Remaining unsold inventory for one ticket type at one showtime.
///
/// The ticket type's `template_availability` seeds this row once at creation
/// time and is never consulted again; this counter is the only value the
/// booking path reads or writes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShowTimeTicketAvailability {
    pub show_time_id: Uuid,
    pub ticket_type_id: Uuid,
    pub available_count: i32,
}

/// An event together with its ticket types, showtimes, and live availability.
#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub ticket_types: Vec<TicketType>,
    pub show_times: Vec<ShowTimeDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowTimeDetail {
    #[serde(flatten)]
    pub show_time: ShowTime,
    pub availability: Vec<ShowTimeTicketAvailability>,
}

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventInput {
    pub slug: String,
    pub name: String,
    pub category: String,
    pub starts_at: DateTime<Utc>,
    pub location: String,
    pub ticket_types: Vec<TicketTypeInput>,
    pub show_times: Vec<ShowTimeInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketTypeInput {
    /// Present when an update keeps an existing ticket type.
    pub id: Option<Uuid>,
    pub name: String,
    pub price: Decimal,
    pub template_availability: i32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShowTimeInput {
    /// Present when an update keeps an existing showtime.
    pub id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub tickets: Vec<ShowTimeTicketInput>,
}

/// One availability row to initialize for a showtime, referencing a ticket
/// type by its position in the payload's `ticket_types` array.
#[derive(Debug, Clone, Deserialize)]
pub struct ShowTimeTicketInput {
    pub ticket_type_index: usize,
    /// When omitted, the ticket type's template availability is copied once
    /// at creation time.
    pub available_count: Option<i32>,
}

/// Wholesale replacement payload for an existing event. The slug is immutable
/// and therefore not accepted here; a payload carrying one is rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEventInput {
    pub name: String,
    pub category: String,
    pub starts_at: DateTime<Utc>,
    pub location: String,
    pub ticket_types: Vec<TicketTypeInput>,
    pub show_times: Vec<ShowTimeInput>,
}
