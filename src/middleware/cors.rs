// CORS configuration

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use super::auth::USER_ID_HEADER;

/// Allow the configured origins, or any origin when none are configured.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(USER_ID_HEADER),
        ]);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}
