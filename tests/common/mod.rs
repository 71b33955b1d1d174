//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Request, Response};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use segment_router::config::{load_config, parse_config};
use segment_router::{HttpServer, RouterConfig, Shutdown};

/// Token and admin key used by the sample configuration.
pub const EDITOR_TOKEN: &str = "editor-secret";
pub const ADMIN_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// The `router.toml` shipped at the crate root.
pub fn sample_config() -> RouterConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("router.toml");
    load_config(&path).unwrap()
}

pub fn config(toml_src: &str) -> RouterConfig {
    parse_config(toml_src).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A server bound to an ephemeral port. Dropping the sender ends reloads;
/// triggering the shutdown stops the server.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub updates: mpsc::UnboundedSender<RouterConfig>,
    pub shutdown: std::sync::Arc<Shutdown>,
    pub handle: tokio::task::JoinHandle<()>,
}

pub async fn start_server(mut config: RouterConfig) -> RunningServer {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let (updates, rx) = mpsc::unbounded_channel();
    let shutdown = std::sync::Arc::new(Shutdown::new());

    let stop = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, rx, &stop).await.unwrap();
    });

    RunningServer {
        addr,
        updates,
        shutdown,
        handle,
    }
}
