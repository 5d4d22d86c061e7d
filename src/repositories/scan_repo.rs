//! Scan records: the exactly-once check-in gate.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::scan::ScanRecord;

pub struct ScanRepo;

impl ScanRepo {
    /// Attempt to create the scan record for a booking inside `tx`.
    ///
    /// The primary key on `booking_id` makes the first insert win; every
    /// concurrent or later attempt gets `None` back. A racing insert in
    /// another transaction blocks this one until it commits, so the loser
    /// always observes the conflict rather than a phantom.
    pub async fn try_insert(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO scan_records (booking_id) VALUES ($1) \
             ON CONFLICT (booking_id) DO NOTHING \
             RETURNING scanned_at",
        )
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await
    }

    pub async fn find(pool: &PgPool, booking_id: Uuid) -> Result<Option<ScanRecord>, sqlx::Error> {
        sqlx::query_as::<_, ScanRecord>(
            "SELECT booking_id, scanned_at FROM scan_records WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_optional(pool)
        .await
    }
}
