use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derive the display scan token for a booking.
///
/// Deterministic for a given booking id and server secret, but not guessable
/// without the secret. The token is display-only (QR payload); the booking id
/// itself is what the verifier looks up.
pub fn scan_token(booking_id: Uuid, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(booking_id.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    format!("{digest:x}")
}
