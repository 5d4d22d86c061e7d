//! Event/ticket-type/showtime authoring: validation and referential
//! invariants enforced before any mutation.
//!
//! The ticket type's `template_availability` is copied into a showtime's
//! availability row once, at the moment the row is created, and never
//! consulted again. Editing a template later does not touch live counters.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::event::{
    CreateEventInput, Event, EventDetail, ShowTime, ShowTimeDetail, ShowTimeInput,
    ShowTimeTicketAvailability, TicketType, TicketTypeInput, UpdateEventInput,
};
use crate::repositories::EventRepo;
use crate::utils::error::{AppError, AppResult};

pub struct Inventory;

impl Inventory {
    pub async fn create_event(pool: &PgPool, input: CreateEventInput) -> AppResult<EventDetail> {
        validate_slug(&input.slug)?;
        validate_spec(&input.ticket_types, &input.show_times)?;

        if EventRepo::slug_exists(pool, &input.slug).await? {
            return Err(AppError::Conflict(format!(
                "Slug '{}' is already in use",
                input.slug
            )));
        }

        let event = Event {
            id: Uuid::new_v4(),
            slug: input.slug,
            name: input.name,
            category: input.category,
            starts_at: input.starts_at,
            location: input.location,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let ticket_types: Vec<TicketType> = input
            .ticket_types
            .iter()
            .map(|tt| build_ticket_type(event.id, Uuid::new_v4(), tt))
            .collect();

        let mut show_times = Vec::new();
        let mut availability = Vec::new();
        for st_input in &input.show_times {
            let show_time = ShowTime {
                id: Uuid::new_v4(),
                event_id: event.id,
                starts_at: st_input.starts_at,
                created_at: chrono::Utc::now(),
            };
            for ticket_ref in &st_input.tickets {
                let ticket_type = &ticket_types[ticket_ref.ticket_type_index];
                availability.push(ShowTimeTicketAvailability {
                    show_time_id: show_time.id,
                    ticket_type_id: ticket_type.id,
                    available_count: ticket_ref
                        .available_count
                        .unwrap_or(ticket_type.template_availability),
                });
            }
            show_times.push(show_time);
        }

        let mut tx = pool.begin().await?;
        EventRepo::insert_event(&mut tx, &event).await?;
        for tt in &ticket_types {
            EventRepo::insert_ticket_type(&mut tx, tt).await?;
        }
        for st in &show_times {
            EventRepo::insert_show_time(&mut tx, st).await?;
        }
        for row in &availability {
            EventRepo::insert_availability_if_absent(&mut tx, row).await?;
        }
        tx.commit().await?;

        tracing::info!(event_id = %event.id, slug = %event.slug, "Event created");
        Self::load_detail(pool, event).await
    }

    /// Wholesale replacement of an event's ticket types and showtimes,
    /// refused while bookings exist against anything being removed.
    pub async fn update_event(
        pool: &PgPool,
        id: Uuid,
        input: UpdateEventInput,
    ) -> AppResult<EventDetail> {
        let existing = EventRepo::find_event(pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {id} was not found")))?;

        validate_spec(&input.ticket_types, &input.show_times)?;

        let existing_tts = EventRepo::ticket_types_for_event(pool, id).await?;
        let existing_sts = EventRepo::show_times_for_event(pool, id).await?;
        validate_kept_ids(&input.ticket_types, &input.show_times, &existing_tts, &existing_sts)?;

        // Assign ids up front: kept rows keep theirs, new rows get fresh ones.
        let ticket_types: Vec<TicketType> = input
            .ticket_types
            .iter()
            .map(|tt| build_ticket_type(id, tt.id.unwrap_or_else(Uuid::new_v4), tt))
            .collect();
        let show_times: Vec<ShowTime> = input
            .show_times
            .iter()
            .map(|st| ShowTime {
                id: st.id.unwrap_or_else(Uuid::new_v4),
                event_id: id,
                starts_at: st.starts_at,
                created_at: chrono::Utc::now(),
            })
            .collect();

        let kept_tt_ids: Vec<Uuid> = ticket_types.iter().map(|t| t.id).collect();
        let kept_st_ids: Vec<Uuid> = show_times.iter().map(|s| s.id).collect();
        let removed_tts: Vec<Uuid> = existing_tts
            .iter()
            .map(|t| t.id)
            .filter(|tid| !kept_tt_ids.contains(tid))
            .collect();
        let removed_sts: Vec<Uuid> = existing_sts
            .iter()
            .map(|s| s.id)
            .filter(|sid| !kept_st_ids.contains(sid))
            .collect();

        // Removals are blocked by any non-cancelled booking.
        if let Some(blocked) = EventRepo::booked_ticket_types(pool, &removed_tts).await?.first() {
            return Err(AppError::Conflict(format!(
                "Ticket type {blocked} has bookings and cannot be removed"
            )));
        }
        if let Some(blocked) = EventRepo::booked_show_times(pool, &removed_sts).await?.first() {
            return Err(AppError::Conflict(format!(
                "Showtime {blocked} has bookings and cannot be removed"
            )));
        }

        // Availability rows for kept showtimes whose (showtime, ticket type)
        // pair is no longer offered: removable only when unbooked.
        let mut desired_pairs: Vec<(Uuid, Uuid)> = Vec::new();
        let mut new_rows: Vec<ShowTimeTicketAvailability> = Vec::new();
        for (st_input, show_time) in input.show_times.iter().zip(&show_times) {
            for ticket_ref in &st_input.tickets {
                let ticket_type = &ticket_types[ticket_ref.ticket_type_index];
                desired_pairs.push((show_time.id, ticket_type.id));
                new_rows.push(ShowTimeTicketAvailability {
                    show_time_id: show_time.id,
                    ticket_type_id: ticket_type.id,
                    available_count: ticket_ref
                        .available_count
                        .unwrap_or(ticket_type.template_availability),
                });
            }
        }
        let kept_existing_sts: Vec<Uuid> = existing_sts
            .iter()
            .map(|s| s.id)
            .filter(|sid| kept_st_ids.contains(sid))
            .collect();
        let dropped_pairs: Vec<(Uuid, Uuid)> =
            EventRepo::availability_for_show_times(pool, &kept_existing_sts)
                .await?
                .into_iter()
                .map(|row| (row.show_time_id, row.ticket_type_id))
                .filter(|pair| !desired_pairs.contains(pair))
                .collect();
        if let Some((st, tt)) = EventRepo::booked_pairs(pool, &dropped_pairs).await?.first() {
            return Err(AppError::Conflict(format!(
                "Ticket type {tt} at showtime {st} has bookings and cannot be removed"
            )));
        }

        let updated = Event {
            name: input.name,
            category: input.category,
            starts_at: input.starts_at,
            location: input.location,
            ..existing
        };

        let mut tx = pool.begin().await?;
        EventRepo::update_event_fields(&mut tx, &updated).await?;
        // Cancelled bookings referencing removed rows go first; anything a
        // live booking still points at makes the delete below fail its
        // foreign key, so a booking landing after the checks above can
        // never be cascaded away.
        EventRepo::delete_cancelled_bookings_referencing(&mut tx, &removed_sts, &removed_tts)
            .await?;
        EventRepo::delete_ticket_types(&mut tx, &removed_tts)
            .await
            .map_err(|err| removal_conflict(err, "a removed ticket type"))?;
        EventRepo::delete_show_times(&mut tx, &removed_sts)
            .await
            .map_err(|err| removal_conflict(err, "a removed showtime"))?;
        for (tt_input, tt) in input.ticket_types.iter().zip(&ticket_types) {
            if tt_input.id.is_some() {
                EventRepo::update_ticket_type(&mut tx, tt).await?;
            } else {
                EventRepo::insert_ticket_type(&mut tx, tt).await?;
            }
        }
        for (st_input, st) in input.show_times.iter().zip(&show_times) {
            if st_input.id.is_some() {
                EventRepo::update_show_time(&mut tx, st).await?;
            } else {
                EventRepo::insert_show_time(&mut tx, st).await?;
            }
        }
        EventRepo::delete_availability_pairs(&mut tx, &dropped_pairs).await?;
        // Existing rows keep their live counters; only genuinely new pairs
        // are seeded here.
        for row in &new_rows {
            EventRepo::insert_availability_if_absent(&mut tx, row).await?;
        }
        tx.commit().await?;

        tracing::info!(event_id = %id, "Event updated");
        Self::load_detail(pool, updated).await
    }

    pub async fn delete_event(pool: &PgPool, id: Uuid) -> AppResult<()> {
        let event = EventRepo::find_event(pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {id} was not found")))?;

        let mut tx = pool.begin().await?;
        // Cancelled bookings are swept here; the dependency count runs in
        // the same transaction, and the bookings foreign keys make the
        // final delete fail rather than take a concurrent booking with it.
        EventRepo::delete_cancelled_bookings_for_event(&mut tx, id).await?;
        let active = EventRepo::active_booking_count(&mut *tx, id).await?;
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "Event {id} has {active} non-cancelled booking(s) and cannot be deleted"
            )));
        }
        EventRepo::delete_event(&mut tx, id)
            .await
            .map_err(|err| removal_conflict(err, "the event"))?;
        tx.commit().await?;

        tracing::info!(event_id = %id, slug = %event.slug, "Event deleted");
        Ok(())
    }

    /// Look an event up by id when the path segment parses as a UUID,
    /// otherwise by slug.
    pub async fn get_event(pool: &PgPool, id_or_slug: &str) -> AppResult<EventDetail> {
        let event = match id_or_slug.parse::<Uuid>() {
            Ok(id) => EventRepo::find_event(pool, id).await?,
            Err(_) => EventRepo::find_event_by_slug(pool, id_or_slug).await?,
        };
        let event = event
            .ok_or_else(|| AppError::NotFound(format!("Event '{id_or_slug}' was not found")))?;
        Self::load_detail(pool, event).await
    }

    pub async fn list_events(pool: &PgPool) -> AppResult<Vec<Event>> {
        Ok(EventRepo::list_events(pool).await?)
    }

    async fn load_detail(pool: &PgPool, event: Event) -> AppResult<EventDetail> {
        let ticket_types = EventRepo::ticket_types_for_event(pool, event.id).await?;
        let show_times = EventRepo::show_times_for_event(pool, event.id).await?;
        let st_ids: Vec<Uuid> = show_times.iter().map(|s| s.id).collect();
        let mut by_show_time: HashMap<Uuid, Vec<ShowTimeTicketAvailability>> = HashMap::new();
        for row in EventRepo::availability_for_show_times(pool, &st_ids).await? {
            by_show_time.entry(row.show_time_id).or_default().push(row);
        }
        let show_times = show_times
            .into_iter()
            .map(|show_time| ShowTimeDetail {
                availability: by_show_time.remove(&show_time.id).unwrap_or_default(),
                show_time,
            })
            .collect();
        Ok(EventDetail {
            event,
            ticket_types,
            show_times,
        })
    }
}

/// A foreign-key violation on a removal means a booking got in between the
/// dependency checks and the write; surface it as the same `Conflict` the
/// checks would have produced.
fn removal_conflict(err: sqlx::Error, what: &str) -> AppError {
    let fk_violation = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23503")
        .unwrap_or(false);
    if fk_violation {
        AppError::Conflict(format!("A booking still references {what}; nothing was changed"))
    } else {
        err.into()
    }
}

fn build_ticket_type(event_id: Uuid, id: Uuid, input: &TicketTypeInput) -> TicketType {
    TicketType {
        id,
        event_id,
        name: input.name.clone(),
        price: input.price,
        template_availability: input.template_availability,
        description: input.description.clone(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

fn validate_slug(slug: &str) -> AppResult<()> {
    if slug.is_empty() {
        return Err(AppError::ValidationError("Slug must not be empty".into()));
    }
    let url_safe = slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !url_safe {
        return Err(AppError::ValidationError(format!(
            "Slug '{slug}' must contain only alphanumerics, '-' or '_'"
        )));
    }
    Ok(())
}

/// Range and shape checks shared by create and update, rejected before any
/// mutation.
fn validate_spec(ticket_types: &[TicketTypeInput], show_times: &[ShowTimeInput]) -> AppResult<()> {
    if ticket_types.is_empty() {
        return Err(AppError::ValidationError(
            "An event needs at least one ticket type".into(),
        ));
    }
    if show_times.is_empty() {
        return Err(AppError::ValidationError(
            "An event needs at least one showtime".into(),
        ));
    }

    let mut names = Vec::new();
    for tt in ticket_types {
        if tt.name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Ticket type name must not be empty".into(),
            ));
        }
        if names.contains(&tt.name) {
            return Err(AppError::ValidationError(format!(
                "Duplicate ticket type name '{}'",
                tt.name
            )));
        }
        names.push(tt.name.clone());
        if tt.price.is_sign_negative() {
            return Err(AppError::ValidationError(format!(
                "Ticket type '{}' has a negative price",
                tt.name
            )));
        }
        if tt.template_availability < 0 {
            return Err(AppError::ValidationError(format!(
                "Ticket type '{}' has a negative template availability",
                tt.name
            )));
        }
    }

    for (idx, st) in show_times.iter().enumerate() {
        if st.tickets.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Showtime #{idx} must reference at least one ticket type"
            )));
        }
        let mut seen = Vec::new();
        for ticket_ref in &st.tickets {
            if ticket_ref.ticket_type_index >= ticket_types.len() {
                return Err(AppError::ValidationError(format!(
                    "Showtime #{idx} references ticket type index {} which does not exist",
                    ticket_ref.ticket_type_index
                )));
            }
            if seen.contains(&ticket_ref.ticket_type_index) {
                return Err(AppError::ValidationError(format!(
                    "Showtime #{idx} references ticket type index {} twice",
                    ticket_ref.ticket_type_index
                )));
            }
            seen.push(ticket_ref.ticket_type_index);
            if let Some(count) = ticket_ref.available_count {
                if count < 0 {
                    return Err(AppError::ValidationError(format!(
                        "Showtime #{idx} has a negative available count"
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Ids carried in an update payload must belong to the event being updated.
fn validate_kept_ids(
    ticket_types: &[TicketTypeInput],
    show_times: &[ShowTimeInput],
    existing_tts: &[crate::models::event::TicketType],
    existing_sts: &[crate::models::event::ShowTime],
) -> AppResult<()> {
    let mut seen_tt = Vec::new();
    for tt in ticket_types.iter().filter_map(|t| t.id) {
        if !existing_tts.iter().any(|e| e.id == tt) {
            return Err(AppError::ValidationError(format!(
                "Ticket type {tt} does not belong to this event"
            )));
        }
        if seen_tt.contains(&tt) {
            return Err(AppError::ValidationError(format!(
                "Ticket type {tt} appears twice in the payload"
            )));
        }
        seen_tt.push(tt);
    }
    let mut seen_st = Vec::new();
    for st in show_times.iter().filter_map(|s| s.id) {
        if !existing_sts.iter().any(|e| e.id == st) {
            return Err(AppError::ValidationError(format!(
                "Showtime {st} does not belong to this event"
            )));
        }
        if seen_st.contains(&st) {
            return Err(AppError::ValidationError(format!(
                "Showtime {st} appears twice in the payload"
            )));
        }
        seen_st.push(st);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::ShowTimeTicketInput;
    use rust_decimal::Decimal;

    fn ticket_type(name: &str, price: i64, availability: i32) -> TicketTypeInput {
        TicketTypeInput {
            id: None,
            name: name.to_string(),
            price: Decimal::from(price),
            template_availability: availability,
            description: None,
        }
    }

    fn show_time(refs: &[usize]) -> ShowTimeInput {
        ShowTimeInput {
            id: None,
            starts_at: chrono::Utc::now(),
            tickets: refs
                .iter()
                .map(|&i| ShowTimeTicketInput {
                    ticket_type_index: i,
                    available_count: None,
                })
                .collect(),
        }
    }

    #[test]
    fn accepts_well_formed_spec() {
        let tts = vec![ticket_type("VIP", 100, 50), ticket_type("Standard", 30, 200)];
        let sts = vec![show_time(&[0, 1]), show_time(&[1])];
        assert!(validate_spec(&tts, &sts).is_ok());
    }

    #[test]
    fn rejects_empty_ticket_types_and_show_times() {
        let tts = vec![ticket_type("VIP", 100, 50)];
        assert!(validate_spec(&[], &[show_time(&[0])]).is_err());
        assert!(validate_spec(&tts, &[]).is_err());
    }

    #[test]
    fn rejects_negative_price() {
        let tts = vec![TicketTypeInput {
            id: None,
            name: "VIP".into(),
            price: Decimal::from(-1),
            template_availability: 10,
            description: None,
        }];
        assert!(validate_spec(&tts, &[show_time(&[0])]).is_err());
    }

    #[test]
    fn rejects_negative_template_availability() {
        let tts = vec![ticket_type("VIP", 10, -1)];
        assert!(validate_spec(&tts, &[show_time(&[0])]).is_err());
    }

    #[test]
    fn rejects_out_of_range_ticket_reference() {
        let tts = vec![ticket_type("VIP", 10, 5)];
        assert!(validate_spec(&tts, &[show_time(&[1])]).is_err());
    }

    #[test]
    fn rejects_duplicate_ticket_reference_in_showtime() {
        let tts = vec![ticket_type("VIP", 10, 5)];
        assert!(validate_spec(&tts, &[show_time(&[0, 0])]).is_err());
    }

    #[test]
    fn rejects_showtime_without_tickets() {
        let tts = vec![ticket_type("VIP", 10, 5)];
        assert!(validate_spec(&tts, &[show_time(&[])]).is_err());
    }

    #[test]
    fn rejects_negative_available_count_override() {
        let tts = vec![ticket_type("VIP", 10, 5)];
        let st = ShowTimeInput {
            id: None,
            starts_at: chrono::Utc::now(),
            tickets: vec![ShowTimeTicketInput {
                ticket_type_index: 0,
                available_count: Some(-3),
            }],
        };
        assert!(validate_spec(&tts, &[st]).is_err());
    }

    #[test]
    fn slug_rules() {
        assert!(validate_slug("summer-fest_2026").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("bad slug").is_err());
        assert!(validate_slug("no/slashes").is_err());
    }
}
