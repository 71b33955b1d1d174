use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::metrics::StatsSnapshot;
use crate::routing::tree::HandlerInfo;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub root: String,
    pub handlers: usize,
    pub max_depth: usize,
    pub principals: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let inner = state.inner.load();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started.elapsed().as_secs(),
        root: inner.config.dispatch.root.clone(),
        handlers: inner.tree.len(),
        max_depth: inner.tree.dispatcher().max_depth(),
        principals: inner.tokens.len(),
    })
}

/// Resolved rule tables and allow-lists, sorted by handler name.
pub async fn get_handlers(State(state): State<AppState>) -> Json<Vec<HandlerInfo>> {
    Json(state.inner.load().tree.describe())
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}
