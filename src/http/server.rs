//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: every path goes to the dispatcher
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Mount the admin API when enabled
//! - Swap in a new handler tree when the config changes
//! - Serve until shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::RouterConfig;
use crate::http::request::{request_id, route_request, UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::observability::metrics::{self, DispatchStats, Outcome};
use crate::routing::{Dispatch, HandlerTree, TreeError};
use crate::security::TokenStore;

/// Everything derived from one configuration version.
#[derive(Debug)]
pub struct RouterState {
    pub tree: HandlerTree,
    pub tokens: TokenStore,
    pub config: RouterConfig,
}

impl RouterState {
    pub fn build(config: RouterConfig) -> Result<Self, TreeError> {
        Ok(Self {
            tree: HandlerTree::build(&config)?,
            tokens: TokenStore::from_config(&config.auth),
            config,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<RouterState>>,
    pub stats: Arc<DispatchStats>,
    pub started: Instant,
}

impl AppState {
    pub fn new(state: RouterState) -> Self {
        metrics::record_handler_count(state.tree.len());
        Self {
            inner: Arc::new(ArcSwap::from_pointee(state)),
            stats: Arc::new(DispatchStats::new()),
            started: Instant::now(),
        }
    }

    /// Build a tree from `config` and make it current. Requests already
    /// running finish on the tree they started with.
    pub fn apply_config(&self, config: RouterConfig) -> Result<(), TreeError> {
        match RouterState::build(config) {
            Ok(state) => {
                tracing::info!(
                    root = %state.config.dispatch.root,
                    handlers = state.tree.len(),
                    "Configuration reloaded"
                );
                metrics::record_handler_count(state.tree.len());
                metrics::record_config_reload(true);
                self.inner.store(Arc::new(state));
                Ok(())
            }
            Err(e) => {
                metrics::record_config_reload(false);
                tracing::error!(error = %e, "Rejected new configuration. Keeping current tree.");
                Err(e)
            }
        }
    }
}

/// HTTP front end of the segment router.
pub struct HttpServer {
    state: AppState,
    router: Router,
}

impl HttpServer {
    pub fn new(config: RouterConfig) -> Result<Self, TreeError> {
        let admin_enabled = config.admin.enabled;
        let timeout = Duration::from_secs(config.timeouts.request_secs);
        let body_limit = config.listener.max_body_size;

        let state = AppState::new(RouterState::build(config)?);
        let router = Self::build_router(state.clone(), admin_enabled, timeout, body_limit);
        Ok(Self { state, router })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        state: AppState,
        admin_enabled: bool,
        timeout: Duration,
        body_limit: usize,
    ) -> Router {
        let mut router = Router::new()
            .route("/", any(dispatch_handler))
            .route("/{*path}", any(dispatch_handler))
            .with_state(state.clone());

        if admin_enabled {
            router = router.merge(setup_admin_router(state));
        }

        router
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(TimeoutLayer::new(timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let id = request
                    .headers()
                    .get(&X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// The fully layered router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener`, applying configs from `updates` until `shutdown`
    /// fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut updates: mpsc::UnboundedReceiver<RouterConfig>,
        shutdown: &Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let mut reload_stop = shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = updates.recv() => match update {
                        Some(config) => {
                            let _ = state.apply_config(config);
                        }
                        None => break,
                    },
                    _ = reload_stop.recv() => break,
                }
            }
            tracing::debug!("Config reload loop stopped");
        });

        let mut serve_stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = serve_stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Dispatch any request through the current handler tree.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, _body) = request.into_parts();
    let inner = state.inner.load_full();

    let mut route = route_request(&parts, &inner.tokens);
    let result = inner.tree.dispatch(&mut route);
    let last_handler = route
        .trail()
        .last()
        .map(String::as_str)
        .unwrap_or(inner.config.dispatch.root.as_str());

    match result {
        Ok(Dispatch::Handled(response)) => {
            state.stats.record(last_handler, Outcome::Handled);
            metrics::record_dispatch("handled", response.status().as_u16(), start);
            response.into_response()
        }
        Ok(Dispatch::Unhandled { handler, remaining }) => {
            tracing::info!(
                request_id = %request_id(&parts),
                handler = %handler,
                remaining = %remaining,
                "No rule matched"
            );
            state.stats.record(last_handler, Outcome::Unhandled);
            metrics::record_dispatch("unhandled", 404, start);
            (
                StatusCode::NOT_FOUND,
                format!("No rule on {handler} matched '{remaining}'"),
            )
                .into_response()
        }
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(request_id = %request_id(&parts), error = %e, "Dispatch failed");
            } else {
                tracing::info!(request_id = %request_id(&parts), error = %e, status = %status, "Dispatch rejected");
            }
            state.stats.record(last_handler, Outcome::Error);
            metrics::record_dispatch(e.kind(), status.as_u16(), start);
            e.into_response()
        }
    }
}
