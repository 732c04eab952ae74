//! Axum route handlers for the JSON binding of the bus.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use virtbus_core::ObjectPath;

use crate::{
    bus::{Bus, MethodCall},
    error::BusFault,
    interface::InterfaceSpec,
    signal::DomainEventSignal,
    value::Value,
};

// ── Shared state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AppState {
    bus: Arc<Bus>,
    max_signal_wait: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(bus: Arc<Bus>, max_signal_wait: Duration) -> Self {
        Self { bus, max_signal_wait }
    }
}

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CallReply {
    pub reply: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct IntrospectQuery {
    pub path: ObjectPath,
}

#[derive(Debug, Serialize)]
pub struct IntrospectReply {
    pub path: ObjectPath,
    pub interfaces: &'static [&'static InterfaceSpec],
}

#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    #[serde(default)]
    pub after: u64,
    #[serde(default)]
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignalsReply {
    pub signals: Vec<DomainEventSignal>,
    /// Newest sequence number at reply time; pass it as `after` next.
    pub last_seq: u64,
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router over the given bus.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/call", post(call))
        .route("/v1/introspect", get(introspect))
        .route("/v1/signals", get(signals))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /health`: liveness probe.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// `POST /v1/call`: dispatch one method call.
///
/// # Errors
/// Returns the [`BusFault`] raised by routing or by the handler.
pub async fn call(State(state): State<AppState>, Json(call): Json<MethodCall>) -> Result<Json<CallReply>, BusFault> {
    let reply = state.bus.call(&call).await?;
    Ok(Json(CallReply { reply }))
}

/// `GET /v1/introspect?path=…`: interfaces exported at a path.
///
/// # Errors
/// Returns [`BusFault::UnknownObject`] if nothing is exported there.
pub async fn introspect(
    State(state): State<AppState>,
    Query(query): Query<IntrospectQuery>,
) -> Result<Json<IntrospectReply>, BusFault> {
    let interfaces = state.bus.introspect(&query.path)?;
    Ok(Json(IntrospectReply { path: query.path, interfaces }))
}

/// `GET /v1/signals?after=N&timeout_ms=T`: signals newer than `N`.
///
/// Waits up to `T` milliseconds, capped by configuration, when none are
/// pending.
pub async fn signals(State(state): State<AppState>, Query(query): Query<SignalsQuery>) -> Json<SignalsReply> {
    let journal = &state.bus.context().signals;
    let timeout = Duration::from_millis(query.timeout_ms).min(state.max_signal_wait);
    let signals = journal.wait_since(query.after, timeout).await;
    Json(SignalsReply { signals, last_seq: journal.last_seq() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;
    use virtbus_core::DomainUuid;
    use virtbus_driver::test_driver::DEFAULT_DOMAIN_UUID;

    use crate::context::testing::default_context;

    fn test_app() -> (Router, ObjectPath) {
        let (ctx, _) = default_context();
        let uuid = match DomainUuid::parse(DEFAULT_DOMAIN_UUID) {
            Ok(u) => u,
            Err(e) => panic!("bad uuid: {e}"),
        };
        let path = ctx.directory.register(uuid);
        let state = AppState::new(Arc::new(Bus::new(ctx)), Duration::from_millis(50));
        (create_router(state), path)
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = match app.oneshot(req).await {
            Ok(r) => r,
            Err(e) => panic!("handler error: {e}"),
        };
        let status = resp.status();
        let bytes = match axum::body::to_bytes(resp.into_body(), 64 * 1024).await {
            Ok(b) => b,
            Err(e) => panic!("failed to read body: {e}"),
        };
        let body = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => panic!("invalid JSON: {e}"),
        };
        (status, body)
    }

    fn post_call(body: &serde_json::Value) -> Request<Body> {
        match Request::builder()
            .method("POST")
            .uri("/v1/call")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
        {
            Ok(r) => r,
            Err(e) => panic!("failed to build request: {e}"),
        }
    }

    fn get_req(uri: &str) -> Request<Body> {
        match Request::builder().uri(uri).body(Body::empty()) {
            Ok(r) => r,
            Err(e) => panic!("failed to build request: {e}"),
        }
    }

    #[tokio::test]
    async fn health_response_format_returns_ok_with_status_field() {
        let (app, _) = test_app();
        let (status, body) = send(app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn call_returns_typed_reply() {
        let (app, path) = test_app();
        let req = post_call(&serde_json::json!({
            "path": path.as_str(),
            "interface": "org.freedesktop.DBus.Properties",
            "member": "Get",
            "args": [{"string": "org.libvirt.Domain"}, {"string": "Name"}],
        }));
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"]["string"], "test");
    }

    #[tokio::test]
    async fn void_method_replies_null() {
        let (app, path) = test_app();
        let req = post_call(&serde_json::json!({
            "path": path.as_str(),
            "interface": "org.libvirt.Domain",
            "member": "Suspend",
        }));
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["reply"].is_null());
    }

    #[tokio::test]
    async fn faults_map_to_status_and_identifier() {
        let (app, path) = test_app();
        let req = post_call(&serde_json::json!({
            "path": path.as_str(),
            "interface": "org.libvirt.Domain",
            "member": "Reset",
            "args": [{"u32": 0}],
        }));
        let (status, body) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body["error"], "org.libvirt.Error.Unsupported");

        let req = post_call(&serde_json::json!({
            "path": path.as_str(),
            "interface": "org.libvirt.Domain",
            "member": "Create",
            "args": [{"u32": 0}],
        }));
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "org.libvirt.Error.InvalidState");
    }

    #[tokio::test]
    async fn introspect_lists_domain_interfaces() {
        let (app, path) = test_app();
        let (status, body) = send(app.clone(), get_req(&format!("/v1/introspect?path={path}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["interfaces"][0]["name"], "org.libvirt.Domain");
        assert_eq!(body["interfaces"][1]["name"], "org.freedesktop.DBus.Properties");

        let stray = ObjectPath::for_domain(DomainUuid::new_v4());
        let (status, body) = send(app, get_req(&format!("/v1/introspect?path={stray}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "org.freedesktop.DBus.Error.UnknownObject");
    }

    #[tokio::test]
    async fn signals_poll_times_out_empty() {
        let (app, _) = test_app();
        let (status, body) = send(app, get_req("/v1/signals?after=0&timeout_ms=10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["signals"].as_array().map(Vec::len), Some(0));
        assert_eq!(body["last_seq"], 0);
    }
}
