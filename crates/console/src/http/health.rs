use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::ServerState;

pub struct HealthState {
    started_at: OffsetDateTime,
    requests: AtomicU64,
    failures: AtomicU64,
    last_error: parking_lot::Mutex<Option<String>>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            started_at: OffsetDateTime::now_utc(),
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_error: parking_lot::Mutex::new(None),
        }
    }

    pub fn record_success(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a request that ended in a server-side failure.
    pub fn record_failure(&self, message: String) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(message);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            started_at: self.started_at,
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}

pub struct HealthSnapshot {
    pub started_at: OffsetDateTime,
    pub requests: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

pub async fn handler(State(state): State<ServerState>) -> impl IntoResponse {
    let snapshot = state.health.snapshot();
    let routes = state.dispatcher.routes().len();
    let status = if routes > 0 { "ok" } else { "degraded" };
    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": snapshot.started_at.format(&Rfc3339).ok(),
        "routes": routes,
        "requests": snapshot.requests,
        "failures": snapshot.failures,
        "last_error": snapshot.last_error,
    }))
}
