//! Persistence for events, ticket types, showtimes, and the availability
//! rows they own. Write-path invariants (unique slug, referential checks,
//! booking-dependency blocks) are enforced by the inventory service on top
//! of these queries.

use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::event::{Event, ShowTime, ShowTimeTicketAvailability, TicketType};

const EVENT_COLUMNS: &str =
    "id, slug, name, category, starts_at, location, created_at, updated_at";

const TICKET_TYPE_COLUMNS: &str =
    "id, event_id, name, price, template_availability, description, created_at, updated_at";

pub struct EventRepo;

impl EventRepo {
    pub async fn slug_exists(pool: &PgPool, slug: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE slug = $1)")
            .bind(slug)
            .fetch_one(pool)
            .await
    }

    pub async fn insert_event(
        tx: &mut Transaction<'_, Postgres>,
        event: &Event,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO events (id, slug, name, category, starts_at, location) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(event.id)
        .bind(&event.slug)
        .bind(&event.name)
        .bind(&event.category)
        .bind(event.starts_at)
        .bind(&event.location)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn update_event_fields(
        tx: &mut Transaction<'_, Postgres>,
        event: &Event,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE events SET name = $2, category = $3, starts_at = $4, location = $5, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.category)
        .bind(event.starts_at)
        .bind(&event.location)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn insert_ticket_type(
        tx: &mut Transaction<'_, Postgres>,
        ticket_type: &TicketType,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO ticket_types (id, event_id, name, price, template_availability, description) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(ticket_type.id)
        .bind(ticket_type.event_id)
        .bind(&ticket_type.name)
        .bind(ticket_type.price)
        .bind(ticket_type.template_availability)
        .bind(&ticket_type.description)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Template availability edits never touch existing availability rows.
    pub async fn update_ticket_type(
        tx: &mut Transaction<'_, Postgres>,
        ticket_type: &TicketType,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE ticket_types SET name = $2, price = $3, template_availability = $4, \
             description = $5, updated_at = NOW() WHERE id = $1",
        )
        .bind(ticket_type.id)
        .bind(&ticket_type.name)
        .bind(ticket_type.price)
        .bind(ticket_type.template_availability)
        .bind(&ticket_type.description)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn delete_ticket_types(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM ticket_types WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn insert_show_time(
        tx: &mut Transaction<'_, Postgres>,
        show_time: &ShowTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO show_times (id, event_id, starts_at) VALUES ($1, $2, $3)")
            .bind(show_time.id)
            .bind(show_time.event_id)
            .bind(show_time.starts_at)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn update_show_time(
        tx: &mut Transaction<'_, Postgres>,
        show_time: &ShowTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE show_times SET starts_at = $2 WHERE id = $1")
            .bind(show_time.id)
            .bind(show_time.starts_at)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn delete_show_times(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM show_times WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Insert an availability row, leaving an existing row's counter alone.
    /// Existing rows are live inventory and are never re-seeded.
    pub async fn insert_availability_if_absent(
        tx: &mut Transaction<'_, Postgres>,
        row: &ShowTimeTicketAvailability,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO show_time_ticket_availability (show_time_id, ticket_type_id, available_count) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (show_time_id, ticket_type_id) DO NOTHING",
        )
        .bind(row.show_time_id)
        .bind(row.ticket_type_id)
        .bind(row.available_count)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn delete_availability_pairs(
        tx: &mut Transaction<'_, Postgres>,
        pairs: &[(Uuid, Uuid)],
    ) -> Result<(), sqlx::Error> {
        if pairs.is_empty() {
            return Ok(());
        }
        let (show_time_ids, ticket_type_ids) = split_pairs(pairs);
        sqlx::query(
            "DELETE FROM show_time_ticket_availability sta \
             USING UNNEST($1::uuid[], $2::uuid[]) AS dropped(show_time_id, ticket_type_id) \
             WHERE sta.show_time_id = dropped.show_time_id \
               AND sta.ticket_type_id = dropped.ticket_type_id",
        )
        .bind(&show_time_ids)
        .bind(&ticket_type_ids)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Remove cancelled bookings (and, via cascade, their lines and scan
    /// records) that reference any of the given showtimes or ticket types.
    /// Non-cancelled bookings are left alone; their foreign keys will refuse
    /// the removal of anything they still point at.
    pub async fn delete_cancelled_bookings_referencing(
        tx: &mut Transaction<'_, Postgres>,
        show_time_ids: &[Uuid],
        ticket_type_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "DELETE FROM bookings b \
             WHERE b.status = 'cancelled' \
               AND (b.show_time_id = ANY($1) \
                    OR EXISTS ( \
                        SELECT 1 FROM booked_tickets bt \
                        WHERE bt.booking_id = b.id \
                          AND (bt.show_time_id = ANY($1) OR bt.ticket_type_id = ANY($2))))",
        )
        .bind(show_time_ids)
        .bind(ticket_type_ids)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn delete_cancelled_bookings_for_event(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM bookings WHERE event_id = $1 AND status = 'cancelled'")
            .bind(event_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn delete_event(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let deleted = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        Ok(deleted == 1)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn find_event(pool: &PgPool, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_event_by_slug(
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<Event>, sqlx::Error> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM events WHERE slug = $1");
        sqlx::query_as::<_, Event>(&query)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_events(pool: &PgPool) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY starts_at");
        sqlx::query_as::<_, Event>(&query).fetch_all(pool).await
    }

    pub async fn ticket_types_for_event(
        pool: &PgPool,
        event_id: Uuid,
    ) -> Result<Vec<TicketType>, sqlx::Error> {
        let query = format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE event_id = $1 ORDER BY name"
        );
        sqlx::query_as::<_, TicketType>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    pub async fn show_times_for_event(
        pool: &PgPool,
        event_id: Uuid,
    ) -> Result<Vec<ShowTime>, sqlx::Error> {
        sqlx::query_as::<_, ShowTime>(
            "SELECT id, event_id, starts_at, created_at FROM show_times \
             WHERE event_id = $1 ORDER BY starts_at",
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_show_time(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<ShowTime>, sqlx::Error> {
        sqlx::query_as::<_, ShowTime>(
            "SELECT id, event_id, starts_at, created_at FROM show_times WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn availability_for_show_time(
        pool: &PgPool,
        show_time_id: Uuid,
    ) -> Result<Vec<ShowTimeTicketAvailability>, sqlx::Error> {
        sqlx::query_as::<_, ShowTimeTicketAvailability>(
            "SELECT show_time_id, ticket_type_id, available_count \
             FROM show_time_ticket_availability WHERE show_time_id = $1",
        )
        .bind(show_time_id)
        .fetch_all(pool)
        .await
    }

    /// Availability rows for a set of showtimes in one round trip.
    pub async fn availability_for_show_times(
        pool: &PgPool,
        show_time_ids: &[Uuid],
    ) -> Result<Vec<ShowTimeTicketAvailability>, sqlx::Error> {
        sqlx::query_as::<_, ShowTimeTicketAvailability>(
            "SELECT show_time_id, ticket_type_id, available_count \
             FROM show_time_ticket_availability WHERE show_time_id = ANY($1)",
        )
        .bind(show_time_ids)
        .fetch_all(pool)
        .await
    }

    // -----------------------------------------------------------------------
    // Booking-dependency checks
    // -----------------------------------------------------------------------

    /// Count bookings against the event that are not cancelled.
    pub async fn active_booking_count(
        executor: impl PgExecutor<'_>,
        event_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE event_id = $1 AND status <> 'cancelled'",
        )
        .bind(event_id)
        .fetch_one(executor)
        .await
    }

    /// Ticket-type ids among `ids` that non-cancelled bookings still reference.
    pub async fn booked_ticket_types(
        executor: impl PgExecutor<'_>,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT bt.ticket_type_id \
             FROM booked_tickets bt \
             JOIN bookings b ON b.id = bt.booking_id \
             WHERE bt.ticket_type_id = ANY($1) AND b.status <> 'cancelled'",
        )
        .bind(ids)
        .fetch_all(executor)
        .await
    }

    /// Showtime ids among `ids` that non-cancelled bookings still reference.
    pub async fn booked_show_times(
        executor: impl PgExecutor<'_>,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT b.show_time_id FROM bookings b \
             WHERE b.show_time_id = ANY($1) AND b.status <> 'cancelled'",
        )
        .bind(ids)
        .fetch_all(executor)
        .await
    }

    /// (showtime, ticket type) pairs among `pairs` that non-cancelled
    /// bookings still reference, resolved in one round trip.
    pub async fn booked_pairs(
        executor: impl PgExecutor<'_>,
        pairs: &[(Uuid, Uuid)],
    ) -> Result<Vec<(Uuid, Uuid)>, sqlx::Error> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let (show_time_ids, ticket_type_ids) = split_pairs(pairs);
        sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT DISTINCT bt.show_time_id, bt.ticket_type_id \
             FROM booked_tickets bt \
             JOIN bookings b ON b.id = bt.booking_id \
             JOIN UNNEST($1::uuid[], $2::uuid[]) AS dropped(show_time_id, ticket_type_id) \
               ON dropped.show_time_id = bt.show_time_id \
              AND dropped.ticket_type_id = bt.ticket_type_id \
             WHERE b.status <> 'cancelled'",
        )
        .bind(&show_time_ids)
        .bind(&ticket_type_ids)
        .fetch_all(executor)
        .await
    }
}

fn split_pairs(pairs: &[(Uuid, Uuid)]) -> (Vec<Uuid>, Vec<Uuid>) {
    pairs.iter().copied().unzip()
}
