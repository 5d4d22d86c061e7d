use std::env;
use std::net::SocketAddr;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Server-side secret mixed into display scan tokens.
    pub scan_token_secret: String,
    /// When set, bookings start in `pending_payment` and wait for the
    /// payment collaborator to confirm; otherwise they are created
    /// `confirmed` (funds cleared before booking creation).
    pub require_payment_confirmation: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .unwrap_or_else(|_| {
                tracing::warn!("Invalid BIND_ADDR, falling back to {DEFAULT_BIND_ADDR}");
                DEFAULT_BIND_ADDR.parse().expect("default bind addr parses")
            });

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/boxoffice".to_string()),
            bind_addr,
            scan_token_secret: env::var("SCAN_TOKEN_SECRET").unwrap_or_else(|_| {
                tracing::warn!("SCAN_TOKEN_SECRET not set, using development default");
                "boxoffice-dev-secret".to_string()
            }),
            require_payment_confirmation: env::var("REQUIRE_PAYMENT_CONFIRMATION")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}
