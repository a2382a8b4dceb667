//! Local HTTP server for exercising the loaders without network access.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: String,
    pub delay: Option<Duration>,
    /// Stream the body in 512-byte pieces with no `Content-Length`.
    pub chunked: bool,
}

impl Route {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/html; charset=utf-8"),
            body: body.into(),
            delay: None,
            chunked: false,
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            content_type: Some("text/plain"),
            ..Self::html(body)
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::html("")
        }
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }
}

impl IntoResponse for Route {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = if self.chunked {
            let pieces: Vec<Result<Vec<u8>, std::io::Error>> = self
                .body
                .as_bytes()
                .chunks(512)
                .map(|piece| Ok(piece.to_vec()))
                .collect();
            (status, Body::from_stream(futures::stream::iter(pieces))).into_response()
        } else {
            (status, self.body).into_response()
        };
        match self.content_type {
            Some(content_type) => {
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            None => {
                response.headers_mut().remove(header::CONTENT_TYPE);
            }
        }
        response
    }
}

struct ServerState {
    routes: HashMap<String, Route>,
    hits: AtomicUsize,
}

async fn serve_route(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let route = state
        .routes
        .get(uri.path())
        .cloned()
        .unwrap_or_else(|| Route::status(404));

    if let Some(delay) = route.delay {
        tokio::time::sleep(delay).await;
    }
    route.into_response()
}

/// axum server on an ephemeral local port; every path not in `routes` is a 404.
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl TestServer {
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState {
            routes: routes
                .into_iter()
                .map(|(path, route)| (path.to_string(), route))
                .collect(),
            hits: AtomicUsize::new(0),
        });

        let app = Router::new()
            .fallback(serve_route)
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

pub const ARTICLE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Understanding Ownership</title>
    <style>body { font-family: sans-serif; }</style>
</head>
<body>
    <header><nav>Home | Blog | About</nav></header>
    <h1>Understanding Ownership</h1>
    <p>Ownership is the set of rules that govern how a program manages memory.</p>
    <p>Each value has a single owner, and the value is dropped when the owner goes out of scope.</p>
    <ul>
        <li>Moves transfer ownership</li>
        <li>Borrows lend access</li>
    </ul>
    <script>console.log("tracking");</script>
    <footer>Copyright 2024</footer>
</body>
</html>"#;
