pub mod routes;

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use log::warn;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::serial::ScaleReader;

/// Build the query router over a shared reader
///
/// # Arguments
/// * `reader` - The running acquisition engine
/// * `cors_origins` - Allowed origins, empty for any origin
pub fn router(reader: Arc<ScaleReader>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/weight", get(routes::get_weight))
        .route("/api/health", get(routes::health))
        .layer(cors_layer(cors_origins))
        .with_state(reader)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}
