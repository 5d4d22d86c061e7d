use axum::http::{header, HeaderName, HeaderValue, Method};
use std::env;
use tower_http::cors::{AllowOrigin, CorsLayer};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(get_allowed_origins())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

fn get_allowed_origins() -> AllowOrigin {
    let origins_str =
        env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string());

    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .filter_map(|origin| {
            let trimmed = origin.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(value) => {
                    tracing::debug!("CORS: allowing origin {}", trimmed);
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!("CORS: invalid origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS: no valid origins configured, using permissive settings");
        AllowOrigin::any()
    } else {
        tracing::info!("CORS: configured with {} allowed origin(s)", origins.len());
        AllowOrigin::list(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creating_the_layer_does_not_panic() {
        let _layer = create_cors_layer();
    }

    #[test]
    fn default_origins_parse_as_header_values() {
        for origin in DEFAULT_ALLOWED_ORIGINS.split(',') {
            assert!(
                origin.trim().parse::<HeaderValue>().is_ok(),
                "default origin '{}' should be a valid HeaderValue",
                origin
            );
        }
    }
}
