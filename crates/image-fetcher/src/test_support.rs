//! In-process origin server for pipeline tests

use crate::fetcher::HttpFetcher;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const IMAGE_LEN: usize = 100;

/// Fetcher that ignores proxy environment variables, so loopback stays loopback
pub fn local_fetcher() -> HttpFetcher {
    HttpFetcher::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
}

/// A running origin; counts every request it serves
pub struct Origin {
    pub addr: SocketAddr,
    pub requests: Arc<AtomicUsize>,
}

impl Origin {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Routes:
/// - `/a.png`: 100 bytes with a content length
/// - `/chunked.png`: 100 bytes streamed without a content length
/// - `/missing.png`: 404
/// - `/empty.png`: 200 with no body
/// - `/private.png`: 100 bytes only with `authorization: Bearer secret`, else 401
pub async fn spawn_origin() -> Origin {
    let requests = Arc::new(AtomicUsize::new(0));

    let counter = requests.clone();
    let router = Router::new()
        .route("/a.png", get(|| async { vec![7u8; IMAGE_LEN] }))
        .route(
            "/chunked.png",
            get(|| async {
                let chunks = vec![
                    Ok::<_, std::io::Error>(Bytes::from(vec![7u8; 40])),
                    Ok(Bytes::from(vec![7u8; 60])),
                ];
                Body::from_stream(futures::stream::iter(chunks))
            }),
        )
        .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }))
        .route("/empty.png", get(|| async { Vec::<u8>::new() }))
        .route(
            "/private.png",
            get(|headers: HeaderMap| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v == "Bearer secret");
                if authorized {
                    vec![9u8; IMAGE_LEN].into_response()
                } else {
                    StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        )
        .layer(axum::middleware::from_fn(
            move |req: axum::extract::Request, next: axum::middleware::Next| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    next.run(req).await
                }
            },
        ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Origin { addr, requests }
}
