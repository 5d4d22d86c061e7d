//! Booking lifecycle against a real database: reservation accounting,
//! compensation on partial failure, idempotent cancellation, and the
//! pending-payment transitions.

mod common;

use boxoffice_server::models::booking::{BookingLineInput, BookingStatus, CreateBookingInput};
use boxoffice_server::services::{BookingEngine, ScanVerifier};
use boxoffice_server::utils::error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

use common::{
    available_count, pending_payment_config, seed_event, show_time_id, test_config, tier_id,
};

fn cart(purchaser: &str, show_time: Uuid, lines: &[(Uuid, i32)]) -> CreateBookingInput {
    CreateBookingInput {
        purchaser_id: purchaser.to_string(),
        show_time_id: show_time,
        lines: lines
            .iter()
            .map(|&(ticket_type_id, quantity)| BookingLineInput {
                ticket_type_id,
                quantity,
            })
            .collect(),
    }
}

#[sqlx::test]
async fn booking_decrements_and_cancel_restores(pool: PgPool) {
    let config = test_config();
    let event = seed_event(&pool, "decrement-restore", &[5]).await;
    let st = show_time_id(&event);
    let tier = tier_id(&event, 0);

    let booking = BookingEngine::create(&pool, &config, cart("u1", st, &[(tier, 3)]))
        .await
        .expect("first booking fits");
    assert_eq!(booking.booking.status, BookingStatus::Confirmed);
    assert_eq!(available_count(&pool, st, tier).await, 2);

    // Second purchaser asks for more than what is left.
    let err = BookingEngine::create(&pool, &config, cart("u2", st, &[(tier, 3)]))
        .await
        .expect_err("only 2 left");
    match err {
        AppError::InsufficientAvailability {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, 3);
            assert_eq!(available, 2);
        }
        other => panic!("expected InsufficientAvailability, got {other:?}"),
    }
    assert_eq!(available_count(&pool, st, tier).await, 2);

    let cancelled = BookingEngine::cancel(&pool, booking.booking.id)
        .await
        .expect("cancel succeeds");
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(available_count(&pool, st, tier).await, 5);
}

#[sqlx::test]
async fn partial_failure_releases_reserved_lines(pool: PgPool) {
    let config = test_config();
    let event = seed_event(&pool, "partial-rollback", &[10, 1]).await;
    let st = show_time_id(&event);
    let tier_a = tier_id(&event, 0);
    let tier_b = tier_id(&event, 1);

    let err = BookingEngine::create(
        &pool,
        &config,
        cart("u1", st, &[(tier_a, 4), (tier_b, 2)]),
    )
    .await
    .expect_err("second line cannot be satisfied");
    match err {
        AppError::InsufficientAvailability { ticket_type_id, .. } => {
            assert_eq!(ticket_type_id, tier_b)
        }
        other => panic!("expected InsufficientAvailability, got {other:?}"),
    }

    // Line one's reservation was fully compensated.
    assert_eq!(available_count(&pool, st, tier_a).await, 10);
    assert_eq!(available_count(&pool, st, tier_b).await, 1);

    // And no partial booking was persisted.
    let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(bookings, 0);
}

#[sqlx::test]
async fn cancel_is_idempotent_and_releases_once(pool: PgPool) {
    let config = test_config();
    let event = seed_event(&pool, "idempotent-cancel", &[5]).await;
    let st = show_time_id(&event);
    let tier = tier_id(&event, 0);

    let booking = BookingEngine::create(&pool, &config, cart("u1", st, &[(tier, 2)]))
        .await
        .unwrap();
    assert_eq!(available_count(&pool, st, tier).await, 3);

    let first = BookingEngine::cancel(&pool, booking.booking.id).await.unwrap();
    assert_eq!(first.status, BookingStatus::Cancelled);
    assert_eq!(available_count(&pool, st, tier).await, 5);

    // Second cancel: no-op success, inventory incremented exactly once.
    let second = BookingEngine::cancel(&pool, booking.booking.id).await.unwrap();
    assert_eq!(second.status, BookingStatus::Cancelled);
    assert_eq!(available_count(&pool, st, tier).await, 5);
}

#[sqlx::test]
async fn cancel_rejects_checked_in_and_unknown_bookings(pool: PgPool) {
    let config = test_config();
    let event = seed_event(&pool, "cancel-guards", &[5]).await;
    let st = show_time_id(&event);
    let tier = tier_id(&event, 0);

    let booking = BookingEngine::create(&pool, &config, cart("u1", st, &[(tier, 1)]))
        .await
        .unwrap();
    ScanVerifier::verify(&pool, booking.booking.id).await.unwrap();

    let err = BookingEngine::cancel(&pool, booking.booking.id)
        .await
        .expect_err("checked-in booking cannot be cancelled");
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(available_count(&pool, st, tier).await, 4);

    let err = BookingEngine::cancel(&pool, Uuid::new_v4())
        .await
        .expect_err("unknown booking");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[sqlx::test]
async fn price_snapshot_survives_template_edits(pool: PgPool) {
    let config = test_config();
    let event = seed_event(&pool, "price-snapshot", &[5]).await;
    let st = show_time_id(&event);
    let tier = tier_id(&event, 0);

    let booking = BookingEngine::create(&pool, &config, cart("u1", st, &[(tier, 2)]))
        .await
        .unwrap();
    let original_total = booking.booking.total_price;

    sqlx::query("UPDATE ticket_types SET price = price * 10 WHERE id = $1")
        .bind(tier)
        .execute(&pool)
        .await
        .unwrap();

    let reread = BookingEngine::get(&pool, booking.booking.id).await.unwrap();
    assert_eq!(reread.booking.total_price, original_total);
    assert_eq!(reread.tickets[0].unit_price, booking.tickets[0].unit_price);
}

#[sqlx::test]
async fn create_rejects_malformed_carts(pool: PgPool) {
    let config = test_config();
    let event = seed_event(&pool, "cart-validation", &[5]).await;
    let st = show_time_id(&event);
    let tier = tier_id(&event, 0);

    let err = BookingEngine::create(&pool, &config, cart("u1", st, &[]))
        .await
        .expect_err("empty cart");
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = BookingEngine::create(&pool, &config, cart("u1", st, &[(tier, 0)]))
        .await
        .expect_err("zero quantity");
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = BookingEngine::create(&pool, &config, cart("u1", st, &[(tier, 1), (tier, 1)]))
        .await
        .expect_err("duplicate lines");
    assert!(matches!(err, AppError::ValidationError(_)));

    // Unknown showtime and foreign ticket type are lookups, not validation.
    let err = BookingEngine::create(&pool, &config, cart("u1", Uuid::new_v4(), &[(tier, 1)]))
        .await
        .expect_err("unknown showtime");
    assert!(matches!(err, AppError::NotFound(_)));

    let err = BookingEngine::create(&pool, &config, cart("u1", st, &[(Uuid::new_v4(), 1)]))
        .await
        .expect_err("ticket type not offered");
    assert!(matches!(err, AppError::NotFound(_)));

    // Nothing above touched the counter.
    assert_eq!(available_count(&pool, st, tier).await, 5);
}

#[sqlx::test]
async fn pending_payment_flow_confirm_then_check_in(pool: PgPool) {
    let config = pending_payment_config();
    let event = seed_event(&pool, "pending-confirm", &[5]).await;
    let st = show_time_id(&event);
    let tier = tier_id(&event, 0);

    let booking = BookingEngine::create(&pool, &config, cart("u1", st, &[(tier, 2)]))
        .await
        .unwrap();
    assert_eq!(booking.booking.status, BookingStatus::PendingPayment);
    // Reservation is held while payment is pending.
    assert_eq!(available_count(&pool, st, tier).await, 3);

    // A pending booking is not scannable and leaves no scan record behind.
    let err = ScanVerifier::verify(&pool, booking.booking.id)
        .await
        .expect_err("pending booking cannot check in");
    assert!(matches!(err, AppError::InvalidState(_)));
    let scans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_records")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(scans, 0);

    let confirmed = BookingEngine::confirm_payment(&pool, booking.booking.id)
        .await
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    // Confirming twice is a no-op success.
    let again = BookingEngine::confirm_payment(&pool, booking.booking.id)
        .await
        .unwrap();
    assert_eq!(again.status, BookingStatus::Confirmed);

    // Expiry after confirmation loses with Conflict and releases nothing.
    let err = BookingEngine::expire(&pool, booking.booking.id)
        .await
        .expect_err("confirmed booking cannot expire");
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(available_count(&pool, st, tier).await, 3);
}

#[sqlx::test]
async fn expiry_releases_exactly_once(pool: PgPool) {
    let config = pending_payment_config();
    let event = seed_event(&pool, "pending-expire", &[5]).await;
    let st = show_time_id(&event);
    let tier = tier_id(&event, 0);

    let booking = BookingEngine::create(&pool, &config, cart("u1", st, &[(tier, 2)]))
        .await
        .unwrap();
    assert_eq!(available_count(&pool, st, tier).await, 3);

    let expired = BookingEngine::expire(&pool, booking.booking.id).await.unwrap();
    assert_eq!(expired.status, BookingStatus::Cancelled);
    assert_eq!(available_count(&pool, st, tier).await, 5);

    // Idempotent: a second expiry does not release again.
    let again = BookingEngine::expire(&pool, booking.booking.id).await.unwrap();
    assert_eq!(again.status, BookingStatus::Cancelled);
    assert_eq!(available_count(&pool, st, tier).await, 5);

    // Late payment confirmation loses with Conflict.
    let err = BookingEngine::confirm_payment(&pool, booking.booking.id)
        .await
        .expect_err("expired booking cannot be confirmed");
    assert!(matches!(err, AppError::Conflict(_)));
}

#[sqlx::test]
async fn cancel_rolls_back_status_when_release_fails(pool: PgPool) {
    let config = test_config();
    let event = seed_event(&pool, "atomic-cancel", &[5]).await;
    let st = show_time_id(&event);
    let tier = tier_id(&event, 0);

    let booking = BookingEngine::create(&pool, &config, cart("u1", st, &[(tier, 2)]))
        .await
        .unwrap();
    assert_eq!(available_count(&pool, st, tier).await, 3);

    // Break the ledger row out from under the booking.
    sqlx::query(
        "DELETE FROM show_time_ticket_availability \
         WHERE show_time_id = $1 AND ticket_type_id = $2",
    )
    .bind(st)
    .bind(tier)
    .execute(&pool)
    .await
    .unwrap();

    let err = BookingEngine::cancel(&pool, booking.booking.id)
        .await
        .expect_err("release has no row to increment");
    assert!(matches!(err, AppError::NotFound(_)));

    // The status flip must have rolled back with the failed release, not
    // committed ahead of it; otherwise the inventory is stranded and a
    // retry would hit the cancelled no-op arm.
    let status: String = sqlx::query_scalar("SELECT status::TEXT FROM bookings WHERE id = $1")
        .bind(booking.booking.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "confirmed");

    // Once the row is back, the retry succeeds and releases exactly once.
    sqlx::query(
        "INSERT INTO show_time_ticket_availability \
         (show_time_id, ticket_type_id, available_count) VALUES ($1, $2, $3)",
    )
    .bind(st)
    .bind(tier)
    .bind(3)
    .execute(&pool)
    .await
    .unwrap();

    let cancelled = BookingEngine::cancel(&pool, booking.booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(available_count(&pool, st, tier).await, 5);
}
