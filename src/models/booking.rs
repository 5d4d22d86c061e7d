use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a booking.
///
/// Legal transitions: `PendingPayment -> Confirmed -> CheckedIn`, plus
/// `PendingPayment -> Cancelled` and `Confirmed -> Cancelled`. `Cancelled`
/// and `CheckedIn` are terminal. Nothing outside the booking engine and the
/// scan verifier writes this column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Cancelled,
    CheckedIn,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::CheckedIn => "checked_in",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub purchaser_id: String,
    pub event_id: Uuid,
    pub show_time_id: Uuid,
    /// Denormalized at booking time for display; later event edits do not
    /// rewrite history.
    pub event_starts_at: DateTime<Utc>,
    pub event_location: String,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub scan_token: String,
    pub created_at: DateTime<Utc>,
}

/// One line of a booking, with the unit price frozen at purchase time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookedTicket {
    pub booking_id: Uuid,
    pub ticket_type_id: Uuid,
    pub show_time_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A booking together with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub tickets: Vec<BookedTicket>,
}

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingInput {
    pub purchaser_id: String,
    pub show_time_id: Uuid,
    pub lines: Vec<BookingLineInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingLineInput {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
}
