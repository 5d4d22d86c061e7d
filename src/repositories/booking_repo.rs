//! Persistence for bookings and their lines.
//!
//! Status changes go through [`BookingRepo::transition`], a guarded
//! conditional update: when two writers race on one booking, exactly one
//! observes `rows_affected == 1`. The winner performs any follow-up work
//! (ledger releases, scan records); losers re-read and report.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::booking::{BookedTicket, Booking, BookingDetail, BookingStatus};

const BOOKING_COLUMNS: &str = "\
    id, purchaser_id, event_id, show_time_id, event_starts_at, event_location, \
    total_price, status, scan_token, created_at";

pub struct BookingRepo;

impl BookingRepo {
    /// Persist a booking and all of its lines as one unit.
    pub async fn insert(
        pool: &PgPool,
        booking: &Booking,
        tickets: &[BookedTicket],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO bookings \
             (id, purchaser_id, event_id, show_time_id, event_starts_at, event_location, \
              total_price, status, scan_token) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(booking.id)
        .bind(&booking.purchaser_id)
        .bind(booking.event_id)
        .bind(booking.show_time_id)
        .bind(booking.event_starts_at)
        .bind(&booking.event_location)
        .bind(booking.total_price)
        .bind(booking.status)
        .bind(&booking.scan_token)
        .execute(&mut *tx)
        .await?;

        for ticket in tickets {
            sqlx::query(
                "INSERT INTO booked_tickets \
                 (booking_id, ticket_type_id, show_time_id, quantity, unit_price) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(ticket.booking_id)
            .bind(ticket.ticket_type_id)
            .bind(ticket.show_time_id)
            .bind(ticket.quantity)
            .bind(ticket.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Booking>, sqlx::Error> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_detail(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<BookingDetail>, sqlx::Error> {
        let Some(booking) = Self::find(pool, id).await? else {
            return Ok(None);
        };
        let tickets = Self::tickets(pool, id).await?;
        Ok(Some(BookingDetail { booking, tickets }))
    }

    pub async fn tickets(pool: &PgPool, id: Uuid) -> Result<Vec<BookedTicket>, sqlx::Error> {
        sqlx::query_as::<_, BookedTicket>(
            "SELECT booking_id, ticket_type_id, show_time_id, quantity, unit_price \
             FROM booked_tickets WHERE booking_id = $1",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_for_purchaser(
        pool: &PgPool,
        purchaser_id: &str,
    ) -> Result<Vec<Booking>, sqlx::Error> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE purchaser_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Booking>(&query)
            .bind(purchaser_id)
            .fetch_all(pool)
            .await
    }

    /// Guarded state transition. Returns true when this caller won the
    /// transition, false when the booking was not in `from` (already moved,
    /// or does not exist).
    pub async fn transition(
        pool: &PgPool,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, sqlx::Error> {
        let updated = sqlx::query("UPDATE bookings SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from)
            .bind(to)
            .execute(pool)
            .await?
            .rows_affected();
        Ok(updated == 1)
    }

    /// Same guarded transition, but inside an open transaction so it can be
    /// paired atomically with another write (the scan-record insert).
    pub async fn transition_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, sqlx::Error> {
        let updated = sqlx::query("UPDATE bookings SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from)
            .bind(to)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        Ok(updated == 1)
    }
}
