//! HTTP server for the image cache proxy
//!
//! Provides /health, /image, /cached and /cache endpoints.

use crate::types::{CachedResponse, HealthResponse, ImageQuery};
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use chrono::{DateTime, Utc};
use image_cache::CacheError;
use image_fetcher::{FetchError, Headers, ImageResolver};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Shared state for the HTTP server
pub struct ServerState {
    pub resolver: ImageResolver,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(resolver: ImageResolver) -> Self {
        Self {
            resolver,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/image", get(get_image).delete(delete_image))
        .route("/cached", get(get_cached))
        .route("/cache", delete(clear_cache))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Only absolute http(s) URLs are proxied
fn validate_url(raw: &str) -> Result<String, Response> {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(raw.to_string()),
        Ok(_) => Err(error_response(
            StatusCode::BAD_REQUEST,
            "Only http and https URLs are supported",
        )),
        Err(_) => Err(error_response(StatusCode::BAD_REQUEST, "Invalid URL")),
    }
}

fn cache_error_status(err: &CacheError) -> StatusCode {
    match err {
        CacheError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn fetch_error_status(err: &FetchError) -> StatusCode {
    match err {
        FetchError::Status(404) | FetchError::Status(410) => StatusCode::NOT_FOUND,
        FetchError::InvalidHeader(_) => StatusCode::BAD_REQUEST,
        FetchError::Cache(err) => cache_error_status(err),
        FetchError::Http(_)
        | FetchError::Status(_)
        | FetchError::EmptyBody
        | FetchError::Decode(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    let (status, cache) = match state.resolver.cache().stats().await {
        Ok(stats) => ("ok", stats),
        Err(e) => {
            warn!(error = %e, "Failed to read cache stats");
            ("degraded", Default::default())
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        uptime_secs,
        cache,
    })
}

/// Get an image by URL, from cache or origin
async fn get_image(
    State(state): State<SharedState>,
    Query(query): Query<ImageQuery>,
) -> Response {
    let url = match validate_url(&query.url) {
        Ok(url) => url,
        Err(response) => return response,
    };

    let resolved = match state.resolver.resolve(&url, &Headers::new(), &()).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to resolve image");
            return error_response(fetch_error_status(&e), &e.to_string());
        }
    };

    let format = match image::guess_format(&resolved.data) {
        Ok(format) => format,
        Err(e) => {
            // Keep bad bytes from being served again on the next request
            if let Err(err) = state
                .resolver
                .report_decode_failure(&url, e.to_string(), &())
                .await
            {
                error!(url = %url, error = %err, "Failed to evict undecodable image");
            }
            return error_response(
                StatusCode::BAD_GATEWAY,
                "Origin did not return a recognized image",
            );
        }
    };

    let cache_header = if resolved.from_cache() { "HIT" } else { "MISS" };
    (
        [
            (header::CONTENT_TYPE, format.to_mime_type()),
            (header::CACHE_CONTROL, "public, max-age=86400"),
            (X_CACHE, cache_header),
        ],
        resolved.data,
    )
        .into_response()
}

/// Whether an image is cached
async fn get_cached(
    State(state): State<SharedState>,
    Query(query): Query<ImageQuery>,
) -> Response {
    match state.resolver.cache().is_cached(&query.url).await {
        Ok(cached) => Json(CachedResponse {
            url: query.url,
            cached,
        })
        .into_response(),
        Err(e) => error_response(cache_error_status(&e), &e.to_string()),
    }
}

/// Remove a single image from the cache
async fn delete_image(
    State(state): State<SharedState>,
    Query(query): Query<ImageQuery>,
) -> Response {
    match state.resolver.cache().delete_entry(&query.url).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(url = %query.url, error = %e, "Failed to delete cache entry");
            error_response(cache_error_status(&e), &e.to_string())
        }
    }
}

/// Wipe the whole cache
async fn clear_cache(State(state): State<SharedState>) -> Response {
    match state.resolver.cache().clear_all().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(error = %e, "Failed to clear cache");
            error_response(cache_error_status(&e), &e.to_string())
        }
    }
}
