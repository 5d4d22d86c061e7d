//! Shared fixtures for the integration suites.

use boxoffice_server::config::Config;
use boxoffice_server::models::event::{
    CreateEventInput, EventDetail, ShowTimeInput, ShowTimeTicketInput, TicketTypeInput,
};
use boxoffice_server::services::Inventory;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        scan_token_secret: "test-secret".into(),
        require_payment_confirmation: false,
    }
}

pub fn pending_payment_config() -> Config {
    Config {
        require_payment_confirmation: true,
        ..test_config()
    }
}

/// One event with a single future showtime and one ticket type per entry in
/// `counts`, each showtime row seeded with that count.
pub async fn seed_event(pool: &PgPool, slug: &str, counts: &[i32]) -> EventDetail {
    let ticket_types: Vec<TicketTypeInput> = counts
        .iter()
        .enumerate()
        .map(|(i, _)| TicketTypeInput {
            id: None,
            name: format!("Tier {i}"),
            price: Decimal::from(25 * (i as i64 + 1)),
            template_availability: 100,
            description: None,
        })
        .collect();
    let tickets: Vec<ShowTimeTicketInput> = counts
        .iter()
        .enumerate()
        .map(|(i, &count)| ShowTimeTicketInput {
            ticket_type_index: i,
            available_count: Some(count),
        })
        .collect();

    let input = CreateEventInput {
        slug: slug.to_string(),
        name: "Test Event".into(),
        category: "music".into(),
        starts_at: Utc::now() + Duration::days(30),
        location: "Main Hall".into(),
        ticket_types,
        show_times: vec![ShowTimeInput {
            id: None,
            starts_at: Utc::now() + Duration::days(30),
            tickets,
        }],
    };

    Inventory::create_event(pool, input)
        .await
        .expect("seed event")
}

pub fn show_time_id(detail: &EventDetail) -> Uuid {
    detail.show_times[0].show_time.id
}

/// Ticket-type id for the tier seeded at `index` (tiers are named "Tier N"
/// and listed alphabetically by the inventory reads).
pub fn tier_id(detail: &EventDetail, index: usize) -> Uuid {
    detail
        .ticket_types
        .iter()
        .find(|tt| tt.name == format!("Tier {index}"))
        .expect("tier exists")
        .id
}

pub async fn available_count(pool: &PgPool, show_time_id: Uuid, ticket_type_id: Uuid) -> i32 {
    sqlx::query_scalar(
        "SELECT available_count FROM show_time_ticket_availability \
         WHERE show_time_id = $1 AND ticket_type_id = $2",
    )
    .bind(show_time_id)
    .bind(ticket_type_id)
    .fetch_one(pool)
    .await
    .expect("availability row")
}
