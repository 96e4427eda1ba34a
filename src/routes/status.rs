use axum::{response::IntoResponse, Json};
use serde_json::json;

use crate::constants::{version::get_version, STARTUP_TIME};

/// `GET /status`, ungated.
#[tracing::instrument]
pub async fn status() -> impl IntoResponse {
    let uptime = STARTUP_TIME.elapsed().unwrap_or_default();

    Json(json!({
        "service": "steno",
        "version": get_version(),
        "rust": rustc_version_runtime::version().to_string(),
        "uptime_secs": uptime.as_secs(),
    }))
}
