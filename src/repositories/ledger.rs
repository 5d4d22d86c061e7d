//! The availability ledger: the only code allowed to mutate
//! `available_count`.
//!
//! Both primitives are single conditional statements, so Postgres row
//! locking serializes operations on one (showtime, ticket type) key while
//! different keys proceed independently. The counter is never read and then
//! written in separate steps.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::utils::error::{AppError, AppResult};

pub struct AvailabilityLedger;

impl AvailabilityLedger {
    /// Atomically check-and-decrement `available_count` by `quantity`.
    ///
    /// Fails with `InsufficientAvailability` naming the shortfall when the
    /// remaining count is too small, and `NotFound` when the ticket type has
    /// no availability row at this showtime.
    pub async fn reserve(
        pool: &PgPool,
        show_time_id: Uuid,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> AppResult<()> {
        if quantity <= 0 {
            return Err(AppError::ValidationError(format!(
                "Reservation quantity must be positive, got {quantity}"
            )));
        }

        let updated = sqlx::query(
            "UPDATE show_time_ticket_availability \
             SET available_count = available_count - $3 \
             WHERE show_time_id = $1 AND ticket_type_id = $2 AND available_count >= $3",
        )
        .bind(show_time_id)
        .bind(ticket_type_id)
        .bind(quantity)
        .execute(pool)
        .await?
        .rows_affected();

        if updated == 1 {
            tracing::debug!(
                %show_time_id,
                %ticket_type_id,
                quantity,
                "Reserved inventory"
            );
            return Ok(());
        }

        // Zero rows affected: either the key does not exist or the counter
        // was too small. A follow-up read tells them apart for the error.
        let available: Option<i32> = sqlx::query_scalar(
            "SELECT available_count FROM show_time_ticket_availability \
             WHERE show_time_id = $1 AND ticket_type_id = $2",
        )
        .bind(show_time_id)
        .bind(ticket_type_id)
        .fetch_optional(pool)
        .await?;

        match available {
            Some(available) => Err(AppError::InsufficientAvailability {
                ticket_type_id,
                requested: quantity,
                available,
            }),
            None => Err(AppError::NotFound(format!(
                "Ticket type {ticket_type_id} is not offered at showtime {show_time_id}"
            ))),
        }
    }

    /// Atomically increment `available_count` by `quantity`.
    ///
    /// Takes any executor so a release can run inside the same transaction
    /// as the status transition that authorizes it; the state machine
    /// guarantees it is requested exactly once per reservation.
    pub async fn release(
        executor: impl PgExecutor<'_>,
        show_time_id: Uuid,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> AppResult<()> {
        if quantity <= 0 {
            return Err(AppError::ValidationError(format!(
                "Release quantity must be positive, got {quantity}"
            )));
        }

        let updated = sqlx::query(
            "UPDATE show_time_ticket_availability \
             SET available_count = available_count + $3 \
             WHERE show_time_id = $1 AND ticket_type_id = $2",
        )
        .bind(show_time_id)
        .bind(ticket_type_id)
        .bind(quantity)
        .execute(executor)
        .await?
        .rows_affected();

        if updated == 1 {
            tracing::debug!(
                %show_time_id,
                %ticket_type_id,
                quantity,
                "Released inventory"
            );
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Ticket type {ticket_type_id} has no availability row at showtime {show_time_id}"
            )))
        }
    }
}
