// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface: a health probe and the ticket-authenticated event socket.

use axum::Json;
use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};
use waynebot_agent::StatusTracker;
use waynebot_hub::Hub;
use waynebot_storage::Database;
use waynebot_storage::queries::credentials;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub hub: Hub,
    pub status: StatusTracker,
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_credentials(true)
}

async fn health(State(state): State<AppState>) -> Response {
    match state.db.schema_version().await {
        Ok(version) => Json(json!({
            "status": "ok",
            "schema_version": version,
            "clients": state.hub.client_count().await,
            "agents": state.status.all(),
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct WsParams {
    #[serde(default)]
    ticket: Option<String>,
}

/// Claims the single-use ticket before upgrading; the ticket is spent even
/// if the upgrade then fails.
async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(ticket) = params.ticket.filter(|t| !t.is_empty()) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let user_id = match credentials::claim_ws_ticket(&state.db, &ticket).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return StatusCode::UNAUTHORIZED.into_response(),
        Err(e) => {
            error!(error = %e, "ws ticket lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match ws {
        Ok(ws) => {
            debug!(user_id, "ws ticket claimed, upgrading");
            waynebot_hub::sink::upgrade(ws, state.hub)
        }
        Err(rejection) => rejection.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;
    use waynebot_test_utils::TestHarness;

    use super::*;

    fn app(h: &TestHarness) -> Router {
        router(
            AppState {
                db: h.db.clone(),
                hub: h.hub.clone(),
                status: StatusTracker::new(),
            },
            &["http://localhost:5173".to_string()],
        )
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_schema_and_clients() {
        let h = TestHarness::new().await.unwrap();
        let resp = app(&h).oneshot(get_req("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["schema_version"].as_i64().unwrap() > 0);
        assert_eq!(json["clients"], 0);
        assert!(json["agents"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ws_requires_a_ticket() {
        let h = TestHarness::new().await.unwrap();
        let resp = app(&h).oneshot(get_req("/ws")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app(&h).oneshot(get_req("/ws?ticket=bogus")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ws_ticket_is_single_use() {
        let h = TestHarness::new().await.unwrap();
        let user = credentials::create_user(&h.db, "alice", "hash").await.unwrap();
        let ticket = credentials::create_ws_ticket(&h.db, user.id, chrono::Duration::seconds(30))
            .await
            .unwrap();
        let uri = format!("/ws?ticket={ticket}");

        // Not an upgrade request, so the handshake is rejected after the claim.
        let resp = app(&h).oneshot(get_req(&uri)).await.unwrap();
        assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.status().is_client_error());

        let resp = app(&h).oneshot(get_req(&uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_only() {
        let h = TestHarness::new().await.unwrap();
        let preflight = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/health")
                .header("origin", origin)
                .header("access-control-request-method", "GET")
                .body(Body::empty())
                .unwrap()
        };

        let resp = app(&h).oneshot(preflight("http://localhost:5173")).await.unwrap();
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:5173"
        );

        let resp = app(&h).oneshot(preflight("http://evil.example")).await.unwrap();
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }
}
