// src/publish/gateway.rs
//
// The trust boundary: every incoming item must carry a valid signed token
// before the admission decision even runs. Admission here is keyed by URL,
// the only stable identifier available at this boundary, which makes the
// endpoint idempotent under upstream retries.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::publish::{RelayMessage, RelaySender};
use crate::store::SeenLedger;

#[derive(Clone)]
pub struct GatewayState {
    pub ledger: Arc<SeenLedger>,
    pub queue: RelaySender,
    pub relay_secret: Arc<str>,
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/incoming", post(incoming))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire shape accepted at the trust boundary.
#[derive(Debug, Deserialize)]
pub struct IncomingItem {
    pub source: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

#[derive(Serialize)]
struct IncomingResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

async fn incoming(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(item): Json<IncomingItem>,
) -> Result<Json<IncomingResponse>, (StatusCode, Json<ErrorBody>)> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let claims = auth::verify_bearer(&state.relay_secret, auth_header).map_err(|e| {
        tracing::warn!(error = %e, "rejected ingress call");
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                detail: e.to_string(),
            }),
        )
    })?;
    tracing::debug!(issuer = %claims.iss, source = %item.source, "ingress call authenticated");

    match state.ledger.admit(&item.source, &item.url, Some(&item.url)) {
        Ok(true) => {}
        Ok(false) => {
            return Ok(Json(IncomingResponse {
                status: "ignored",
                reason: Some("duplicate"),
            }))
        }
        Err(e) => {
            tracing::error!(error = ?e, "ledger admission failed");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    detail: "ledger unavailable".to_string(),
                }),
            ));
        }
    }

    let title = item
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| item.url.clone());
    let message = RelayMessage {
        source: item.source,
        url: item.url,
        title,
    };
    if let Err(e) = state.queue.push(message) {
        tracing::error!(error = ?e, "failed to enqueue admitted item");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                detail: "delivery queue unavailable".to_string(),
            }),
        ));
    }
    Ok(Json(IncomingResponse {
        status: "posted",
        reason: None,
    }))
}
