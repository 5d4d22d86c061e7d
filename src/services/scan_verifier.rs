//! Gate check-in with exactly-once semantics.
//!
//! The scan-record insert and the `confirmed -> checked_in` transition
//! commit as one transaction. When two gate devices scan the same booking
//! at once, the scan-record primary key decides the winner: exactly one
//! caller sees `Valid`, every other sees `AlreadyScanned` with the original
//! timestamp.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::booking::{BookingDetail, BookingStatus};
use crate::repositories::{BookingRepo, ScanRepo};
use crate::utils::error::{AppError, AppResult};

/// Outcome of a gate scan. `AlreadyScanned` is not a failure: the caller
/// must surface it differently from `Valid` (turn the attendee away), but
/// the request itself succeeded.
#[derive(Debug)]
pub enum ScanOutcome {
    Valid(BookingDetail),
    AlreadyScanned {
        booking: BookingDetail,
        scanned_at: DateTime<Utc>,
    },
}

pub struct ScanVerifier;

impl ScanVerifier {
    pub async fn verify(pool: &PgPool, booking_id: Uuid) -> AppResult<ScanOutcome> {
        let detail = BookingRepo::find_detail(pool, booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Ticket Not Found".into()))?;

        match detail.booking.status {
            BookingStatus::PendingPayment => Err(AppError::InvalidState(format!(
                "Booking {booking_id} has not been paid yet"
            ))),
            BookingStatus::Cancelled => Err(AppError::InvalidState(format!(
                "Booking {booking_id} was cancelled"
            ))),
            BookingStatus::CheckedIn => Self::already_scanned(pool, detail).await,
            BookingStatus::Confirmed => Self::attempt_check_in(pool, detail).await,
        }
    }

    async fn attempt_check_in(pool: &PgPool, mut detail: BookingDetail) -> AppResult<ScanOutcome> {
        let booking_id = detail.booking.id;
        let mut tx = pool.begin().await?;

        match ScanRepo::try_insert(&mut tx, booking_id).await? {
            Some(scanned_at) => {
                // We own the scan record; flip the status in the same
                // transaction. The guard can still lose to a concurrent
                // cancellation, in which case nothing is committed.
                let flipped = BookingRepo::transition_in_tx(
                    &mut tx,
                    booking_id,
                    BookingStatus::Confirmed,
                    BookingStatus::CheckedIn,
                )
                .await?;
                if !flipped {
                    tx.rollback().await?;
                    return Err(AppError::InvalidState(format!(
                        "Booking {booking_id} changed state during check-in"
                    )));
                }
                tx.commit().await?;

                tracing::info!(%booking_id, %scanned_at, "Ticket checked in");
                detail.booking.status = BookingStatus::CheckedIn;
                Ok(ScanOutcome::Valid(detail))
            }
            None => {
                // Lost the insert race (or the record predates this call);
                // the winner has committed, so the record is readable.
                tx.rollback().await?;
                Self::already_scanned(pool, detail).await
            }
        }
    }

    async fn already_scanned(pool: &PgPool, mut detail: BookingDetail) -> AppResult<ScanOutcome> {
        let booking_id = detail.booking.id;
        let record = ScanRepo::find(pool, booking_id).await?.ok_or_else(|| {
            AppError::Conflict(format!(
                "Booking {booking_id} is checked in but has no scan record"
            ))
        })?;
        tracing::info!(%booking_id, scanned_at = %record.scanned_at, "Replayed scan rejected");
        // A scan record only ever commits together with the flip to
        // checked_in, so the snapshot can be brought up to date locally.
        detail.booking.status = BookingStatus::CheckedIn;
        Ok(ScanOutcome::AlreadyScanned {
            booking: detail,
            scanned_at: record.scanned_at,
        })
    }
}
