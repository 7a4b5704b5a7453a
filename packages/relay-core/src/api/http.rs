//! HTTP route handlers.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;

use crate::api::AppState;
use crate::error::{RelayError, RelayResult};
use crate::protocol_constants::{MAX_GENA_BODY_SIZE, SERVICE_ID};

// ─────────────────────────────────────────────────────────────────────────────
// GENA Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Validates required GENA headers and extracts SID and SEQ values.
fn validate_gena_headers(headers: &HeaderMap) -> RelayResult<(String, String)> {
    let nt = headers.get("NT").and_then(|v| v.to_str().ok());
    if nt != Some("upnp:event") {
        log::warn!("[GENA] NOTIFY missing or invalid NT header: {:?}", nt);
        return Err(RelayError::InvalidRequest(
            "Missing or invalid NT header".into(),
        ));
    }

    let nts = headers.get("NTS").and_then(|v| v.to_str().ok());
    if nts != Some("upnp:propchange") {
        log::warn!("[GENA] NOTIFY missing or invalid NTS header: {:?}", nts);
        return Err(RelayError::InvalidRequest(
            "Missing or invalid NTS header".into(),
        ));
    }

    let sid = match headers.get("SID").and_then(|v| v.to_str().ok()) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => {
            log::warn!("[GENA] NOTIFY missing SID header");
            return Err(RelayError::InvalidRequest("Missing SID header".into()));
        }
    };

    // Logged only; Sonos resends full state on every event
    let seq = headers
        .get("SEQ")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("?")
        .to_string();

    Ok((sid, seq))
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/audio/{file}", get(serve_audio))
        .route("/sonos/gena", any(handle_gena_notify))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "cachedClips": state.cache.len(),
        "subscriptions": state.gena.len(),
    }))
}

async fn serve_audio(
    Path(file): Path<String>,
    State(state): State<AppState>,
) -> RelayResult<Response> {
    let Some(bytes) = state.cache.get(&file) else {
        log::debug!("[AudioCache] Request for {} met with 404", file);
        return Err(RelayError::AudioNotFound(file));
    };
    log::debug!("[AudioCache] Serving {} ({} bytes)", file, bytes.len());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(bytes))
        .map_err(|e| RelayError::Server(e.to_string()))
}

async fn handle_gena_notify(
    State(state): State<AppState>,
    req: Request<Body>,
) -> RelayResult<impl IntoResponse> {
    let (parts, body) = req.into_parts();

    if parts.method.as_str() != "NOTIFY" {
        return Err(RelayError::InvalidRequest(format!(
            "Expected NOTIFY method, got {}",
            parts.method
        )));
    }

    let (sid, seq) = validate_gena_headers(&parts.headers)?;

    let body_bytes = axum::body::to_bytes(body, MAX_GENA_BODY_SIZE)
        .await
        .map_err(|e| {
            log::warn!("[GENA] Failed to read NOTIFY body: {}", e);
            RelayError::InvalidRequest("Failed to read body".into())
        })?;

    let handled = state
        .gena
        .handle_notify(&sid, &String::from_utf8_lossy(&body_bytes));
    log::trace!("[GENA] NOTIFY {} (SEQ: {}) handled={}", sid, seq, handled);

    // Acknowledge unknown SIDs too, or the speaker keeps retrying
    Ok(StatusCode::OK)
}
