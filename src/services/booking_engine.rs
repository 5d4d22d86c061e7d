//! Turns a cart of (ticket type, quantity) lines into a durable booking and
//! drives the booking state machine.
//!
//! Lines are reserved one key at a time; no two inventory rows are ever
//! locked together. A failed line triggers a compensating release of every
//! line reserved so far, so a partial booking is never persisted and two
//! carts reserving overlapping ticket types in different orders cannot
//! deadlock.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::models::booking::{
    BookedTicket, Booking, BookingDetail, BookingLineInput, BookingStatus, CreateBookingInput,
};
use crate::repositories::{AvailabilityLedger, BookingRepo, EventRepo};
use crate::utils::error::{AppError, AppResult};
use crate::utils::token::scan_token;

pub struct BookingEngine;

impl BookingEngine {
    pub async fn create(
        pool: &PgPool,
        config: &Config,
        input: CreateBookingInput,
    ) -> AppResult<BookingDetail> {
        validate_lines(&input.lines)?;
        if input.purchaser_id.trim().is_empty() {
            return Err(AppError::ValidationError(
                "purchaser_id must not be empty".into(),
            ));
        }

        let show_time = EventRepo::find_show_time(pool, input.show_time_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Showtime {} was not found", input.show_time_id))
            })?;
        let event = EventRepo::find_event(pool, show_time.event_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Event {} was not found", show_time.event_id))
            })?;

        let offered: Vec<Uuid> = EventRepo::availability_for_show_time(pool, show_time.id)
            .await?
            .into_iter()
            .map(|row| row.ticket_type_id)
            .collect();
        let price_by_type: HashMap<Uuid, Decimal> =
            EventRepo::ticket_types_for_event(pool, event.id)
                .await?
                .into_iter()
                .map(|tt| (tt.id, tt.price))
                .collect();
        let mut prices: HashMap<Uuid, Decimal> = HashMap::new();
        for line in &input.lines {
            if !offered.contains(&line.ticket_type_id) {
                return Err(AppError::NotFound(format!(
                    "Ticket type {} is not offered at showtime {}",
                    line.ticket_type_id, show_time.id
                )));
            }
            let price = price_by_type.get(&line.ticket_type_id).ok_or_else(|| {
                AppError::NotFound(format!(
                    "Ticket type {} was not found",
                    line.ticket_type_id
                ))
            })?;
            prices.insert(line.ticket_type_id, *price);
        }

        // Reserve line by line; on the first failure, put back everything
        // already taken before surfacing the error.
        let mut reserved: Vec<&BookingLineInput> = Vec::new();
        for line in &input.lines {
            match AvailabilityLedger::reserve(
                pool,
                show_time.id,
                line.ticket_type_id,
                line.quantity,
            )
            .await
            {
                Ok(()) => reserved.push(line),
                Err(err) => {
                    Self::compensate(pool, show_time.id, &reserved).await;
                    return Err(err);
                }
            }
        }

        let status = if config.require_payment_confirmation {
            BookingStatus::PendingPayment
        } else {
            BookingStatus::Confirmed
        };
        let id = Uuid::new_v4();
        let total_price: Decimal = input
            .lines
            .iter()
            .map(|line| prices[&line.ticket_type_id] * Decimal::from(line.quantity))
            .sum();

        let booking = Booking {
            id,
            purchaser_id: input.purchaser_id,
            event_id: event.id,
            show_time_id: show_time.id,
            event_starts_at: event.starts_at,
            event_location: event.location.clone(),
            total_price,
            status,
            scan_token: scan_token(id, &config.scan_token_secret),
            created_at: chrono::Utc::now(),
        };
        let tickets: Vec<BookedTicket> = input
            .lines
            .iter()
            .map(|line| BookedTicket {
                booking_id: id,
                ticket_type_id: line.ticket_type_id,
                show_time_id: show_time.id,
                quantity: line.quantity,
                unit_price: prices[&line.ticket_type_id],
            })
            .collect();

        if let Err(err) = BookingRepo::insert(pool, &booking, &tickets).await {
            Self::compensate(pool, show_time.id, &input.lines.iter().collect::<Vec<_>>()).await;
            return Err(err.into());
        }

        tracing::info!(
            booking_id = %id,
            purchaser_id = %booking.purchaser_id,
            show_time_id = %show_time.id,
            total_price = %total_price,
            status = status.as_str(),
            "Booking created"
        );

        Ok(BookingDetail { booking, tickets })
    }

    /// Cancel a confirmed booking for a future showtime, releasing its
    /// inventory. Cancelling an already-cancelled booking is a no-op success.
    pub async fn cancel(pool: &PgPool, id: Uuid) -> AppResult<Booking> {
        let booking = Self::require(pool, id).await?;

        match booking.status {
            BookingStatus::Cancelled => return Ok(booking),
            BookingStatus::CheckedIn => {
                return Err(AppError::Conflict(format!(
                    "Booking {id} is already checked in and cannot be cancelled"
                )))
            }
            BookingStatus::PendingPayment => {
                return Err(AppError::Conflict(format!(
                    "Booking {id} is awaiting payment; expire it instead of cancelling"
                )))
            }
            BookingStatus::Confirmed => {}
        }

        let show_time = EventRepo::find_show_time(pool, booking.show_time_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Showtime {} was not found", booking.show_time_id))
            })?;
        if show_time.starts_at <= chrono::Utc::now() {
            return Err(AppError::Conflict(format!(
                "Booking {id} is for a showtime that has already started"
            )));
        }

        let tickets = Self::lines_in_release_order(pool, id).await?;
        let mut tx = pool.begin().await?;
        let won = BookingRepo::transition_in_tx(
            &mut tx,
            id,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        )
        .await?;
        if won {
            // Only the transition winner releases, so inventory comes back
            // exactly once however many cancel calls race. The releases
            // share the winner's transaction: either the status flip and
            // every increment commit together, or none of them do and the
            // cancel can be retried.
            Self::release_lines_in_tx(&mut tx, &tickets).await?;
            tx.commit().await?;
            tracing::info!(booking_id = %id, "Booking cancelled");
            return Self::require(pool, id).await;
        }
        tx.rollback().await?;

        let current = Self::require(pool, id).await?;
        match current.status {
            BookingStatus::Cancelled => Ok(current),
            _ => Err(AppError::Conflict(format!(
                "Booking {id} changed state while cancelling (now {})",
                current.status.as_str()
            ))),
        }
    }

    /// `pending_payment -> confirmed`. Loses with `Conflict` against a
    /// racing expiry; confirming an already-confirmed booking is a no-op.
    pub async fn confirm_payment(pool: &PgPool, id: Uuid) -> AppResult<Booking> {
        let won = BookingRepo::transition(
            pool,
            id,
            BookingStatus::PendingPayment,
            BookingStatus::Confirmed,
        )
        .await?;
        let booking = Self::require(pool, id).await?;
        if won {
            tracing::info!(booking_id = %id, "Payment confirmed");
            return Ok(booking);
        }
        match booking.status {
            BookingStatus::Confirmed => Ok(booking),
            BookingStatus::Cancelled => Err(AppError::Conflict(format!(
                "Booking {id} expired before payment was confirmed"
            ))),
            _ => Err(AppError::Conflict(format!(
                "Booking {id} is {} and cannot be confirmed",
                booking.status.as_str()
            ))),
        }
    }

    /// `pending_payment -> cancelled` on payment timeout, releasing
    /// inventory exactly once. Idempotent; loses with `Conflict` against a
    /// racing late confirmation.
    pub async fn expire(pool: &PgPool, id: Uuid) -> AppResult<Booking> {
        let tickets = Self::lines_in_release_order(pool, id).await?;
        let mut tx = pool.begin().await?;
        let won = BookingRepo::transition_in_tx(
            &mut tx,
            id,
            BookingStatus::PendingPayment,
            BookingStatus::Cancelled,
        )
        .await?;
        if won {
            Self::release_lines_in_tx(&mut tx, &tickets).await?;
            tx.commit().await?;
            tracing::info!(booking_id = %id, "Booking expired");
            return Self::require(pool, id).await;
        }
        tx.rollback().await?;
        let booking = Self::require(pool, id).await?;
        match booking.status {
            BookingStatus::Cancelled => Ok(booking),
            BookingStatus::Confirmed => Err(AppError::Conflict(format!(
                "Booking {id} was paid before the expiry ran"
            ))),
            _ => Err(AppError::Conflict(format!(
                "Booking {id} is {} and cannot be expired",
                booking.status.as_str()
            ))),
        }
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<BookingDetail> {
        BookingRepo::find_detail(pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {id} was not found")))
    }

    pub async fn list_for_purchaser(
        pool: &PgPool,
        purchaser_id: &str,
    ) -> AppResult<Vec<Booking>> {
        Ok(BookingRepo::list_for_purchaser(pool, purchaser_id).await?)
    }

    async fn require(pool: &PgPool, id: Uuid) -> AppResult<Booking> {
        BookingRepo::find(pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {id} was not found")))
    }

    /// Booking lines sorted by (showtime, ticket type) so concurrent
    /// releases touching overlapping keys always lock rows in the same
    /// order.
    async fn lines_in_release_order(pool: &PgPool, id: Uuid) -> AppResult<Vec<BookedTicket>> {
        let mut tickets = BookingRepo::tickets(pool, id).await?;
        tickets.sort_by_key(|t| (t.show_time_id, t.ticket_type_id));
        Ok(tickets)
    }

    async fn release_lines_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tickets: &[BookedTicket],
    ) -> AppResult<()> {
        for ticket in tickets {
            AvailabilityLedger::release(
                &mut **tx,
                ticket.show_time_id,
                ticket.ticket_type_id,
                ticket.quantity,
            )
            .await?;
        }
        Ok(())
    }

    /// Put back reservations taken by a booking attempt that is being
    /// abandoned. Failures are logged but not propagated: the original
    /// error must reach the caller untouched.
    async fn compensate(pool: &PgPool, show_time_id: Uuid, reserved: &[&BookingLineInput]) {
        for line in reserved {
            if let Err(err) = AvailabilityLedger::release(
                pool,
                show_time_id,
                line.ticket_type_id,
                line.quantity,
            )
            .await
            {
                tracing::error!(
                    %show_time_id,
                    ticket_type_id = %line.ticket_type_id,
                    quantity = line.quantity,
                    error = ?err,
                    "Compensating release failed; inventory may be understated"
                );
            }
        }
    }
}

fn validate_lines(lines: &[BookingLineInput]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(AppError::ValidationError(
            "A booking needs at least one line".into(),
        ));
    }
    let mut seen = Vec::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::ValidationError(format!(
                "Quantity for ticket type {} must be positive, got {}",
                line.ticket_type_id, line.quantity
            )));
        }
        if seen.contains(&line.ticket_type_id) {
            return Err(AppError::ValidationError(format!(
                "Ticket type {} appears in more than one line",
                line.ticket_type_id
            )));
        }
        seen.push(line.ticket_type_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32) -> BookingLineInput {
        BookingLineInput {
            ticket_type_id: Uuid::new_v4(),
            quantity,
        }
    }

    #[test]
    fn rejects_empty_cart() {
        assert!(validate_lines(&[]).is_err());
    }

    #[test]
    fn rejects_non_positive_quantity() {
        assert!(validate_lines(&[line(0)]).is_err());
        assert!(validate_lines(&[line(-2)]).is_err());
        assert!(validate_lines(&[line(1)]).is_ok());
    }

    #[test]
    fn rejects_duplicate_ticket_type_lines() {
        let a = line(1);
        let dup = BookingLineInput {
            ticket_type_id: a.ticket_type_id,
            quantity: 2,
        };
        assert!(validate_lines(&[a, dup]).is_err());
    }
}
