//! HTTP command surface of the orchestrator.
//!
//! # Endpoints
//!
//! - `GET /` - Liveness text
//! - `POST /move` - Move the claw (`{direction}`; `grab` may carry both `x` and `y`)
//! - `POST /grab` - Grab at `{position:{x,y}}` or `{x,y}`
//! - `POST /layout`, `POST /objects_layout` - Replace the layout
//! - `POST /alert` - Set the sugar level
//! - `POST /ambient_start`, `POST /ambient_stop`, `POST /refresh` - Signals
//! - `GET /objects` - Catalog
//! - `GET /state` - Position, layout and sugar level
//! - `GET /bus` - Event bus websocket
//!
//! Bodies are read as raw JSON and validated here, so every malformed
//! command is a `400` with `{"error": "..."}`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sweet_protocol::{Direction, GrabPayload, LayoutObject, Position, SnapshotPayload};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::catalog::{Catalog, CatalogItem};
use crate::error::{CoreError, Result};
use crate::state::level_from_number;
use crate::websocket::bus_handler;
use crate::Orchestrator;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body for `POST /move`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResponse {
    /// Always `true`.
    pub ok: bool,
    /// The accepted direction.
    pub direction: Direction,
    /// Position after the move.
    pub position: Position,
    /// For `grab`: whether something was grabbed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<bool>,
    /// For `grab`: the grabbed object or the sentinel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<GrabPayload>,
}

/// Response body for `POST /grab`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrabResponse {
    /// Always `true`.
    pub ok: bool,
    /// Whether an object was within reach.
    pub matched: bool,
    /// The grabbed object or the sentinel.
    pub object: GrabPayload,
}

/// Response body for `POST /layout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutResponse {
    /// Always `true`.
    pub ok: bool,
    /// Number of objects in the new layout.
    pub count: usize,
    /// Whether the layout reached disk.
    pub persisted: bool,
}

/// Response body for `POST /alert`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertResponse {
    /// Always `true`.
    pub ok: bool,
    /// The stored sugar level.
    pub level: i64,
}

/// Response body for signalling endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    /// Always `true`.
    pub ok: bool,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The single writer of claw state.
    pub orchestrator: Arc<Orchestrator>,
    /// Items available for layouts.
    pub catalog: Arc<Catalog>,
}

impl AppState {
    /// Creates application state with the built-in catalog.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self::with_catalog(orchestrator, Catalog::default())
    }

    /// Creates application state with a specific catalog.
    #[must_use]
    pub fn with_catalog(orchestrator: Arc<Orchestrator>, catalog: Catalog) -> Self {
        Self {
            orchestrator,
            catalog: Arc::new(catalog),
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        warn!(status = status.as_u16(), error = %self.0, "Command rejected");

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

// ============================================================================
// Body Validation
// ============================================================================

/// Parses a request body. An empty body is `null`.
fn parse_body(bytes: &Bytes) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| CoreError::validation(format!("Invalid JSON body: {e}")))
}

/// Reads an integer coordinate, rounding fractional values.
#[allow(clippy::cast_possible_truncation)]
fn parse_coordinate(value: Option<&Value>, field: &str) -> Result<i32> {
    let number = value
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
        .map(f64::round)
        .filter(|n| (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(n))
        .ok_or_else(|| CoreError::validation(format!("{field} must be a number")))?;
    Ok(number as i32)
}

/// Parses a `move` body into a direction and an optional grab point.
pub fn parse_move(body: &Value) -> Result<(Direction, Option<Position>)> {
    let raw = body
        .get("direction")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| CoreError::validation("No direction provided"))?;

    let direction: Direction = raw
        .parse()
        .map_err(|e: sweet_protocol::ProtocolError| CoreError::validation(e.to_string()))?;

    if direction != Direction::Grab {
        return Ok((direction, None));
    }

    let grab_at = match (body.get("x"), body.get("y")) {
        (None, None) => None,
        (Some(x), Some(y)) => Some(Position::new(
            parse_coordinate(Some(x), "x")?,
            parse_coordinate(Some(y), "y")?,
        )),
        _ => return Err(CoreError::validation("Grab needs both x and y, or neither")),
    };

    Ok((direction, grab_at))
}

/// Parses a `grab` body: `{position:{x,y}}` or `{x,y}`.
pub fn parse_grab(body: &Value) -> Result<Position> {
    let point = body
        .get("position")
        .filter(|p| p.is_object())
        .unwrap_or(body);

    if point.get("x").is_none() || point.get("y").is_none() {
        return Err(CoreError::validation("Missing position"));
    }

    Ok(Position::new(
        parse_coordinate(point.get("x"), "position.x")?,
        parse_coordinate(point.get("y"), "position.y")?,
    ))
}

/// Parses a `layout` body into layout objects, all or nothing.
pub fn parse_layout(body: &Value) -> Result<Vec<LayoutObject>> {
    let objects = body
        .get("objects")
        .and_then(Value::as_array)
        .ok_or_else(|| CoreError::validation("objects must be an array"))?;

    objects
        .iter()
        .enumerate()
        .map(|(i, object)| parse_layout_object(i, object))
        .collect()
}

fn parse_layout_object(index: usize, value: &Value) -> Result<LayoutObject> {
    let field = |name: &str| format!("objects[{index}].{name}");

    if !value.is_object() {
        return Err(CoreError::validation(format!(
            "objects[{index}] must be an object"
        )));
    }

    let id = value
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| CoreError::validation(format!("{} must be an integer", field("id"))))?;

    let name = value
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            CoreError::validation(format!("{} must be a non-empty string", field("name")))
        })?;

    let sugar_value = value
        .get("sugarValue")
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            CoreError::validation(format!("{} must be an integer", field("sugarValue")))
        })?;

    let x = parse_coordinate(value.get("x"), &field("x"))?;
    let y = parse_coordinate(value.get("y"), &field("y"))?;

    Ok(LayoutObject::new(id, name, sugar_value, x, y))
}

/// Parses an `alert` body into a clamped sugar level.
pub fn parse_level(body: &Value) -> Result<i64> {
    body.get("level")
        .and_then(Value::as_f64)
        .and_then(level_from_number)
        .ok_or_else(|| CoreError::validation("level must be a number"))
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with every command route and the bus endpoint.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/move", post(handle_move))
        .route("/grab", post(handle_grab))
        .route("/layout", post(handle_layout))
        .route("/objects_layout", post(handle_layout))
        .route("/alert", post(handle_alert))
        .route("/ambient_start", post(handle_ambient_start))
        .route("/ambient_stop", post(handle_ambient_stop))
        .route("/refresh", post(handle_refresh))
        .route("/objects", get(handle_objects))
        .route("/state", get(handle_state))
        .route("/bus", get(bus_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_root() -> &'static str {
    "Core API running"
}

/// Handler for `POST /move`.
async fn handle_move(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> std::result::Result<Json<MoveResponse>, ApiError> {
    let (direction, grab_at) = parse_move(&parse_body(&body)?)?;
    let outcome = state.orchestrator.move_claw(direction, grab_at).await;

    Ok(Json(MoveResponse {
        ok: true,
        direction: outcome.direction,
        position: outcome.position,
        matched: outcome.grab.as_ref().map(|g| g.matched),
        object: outcome.grab.map(|g| g.object),
    }))
}

/// Handler for `POST /grab`.
async fn handle_grab(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> std::result::Result<Json<GrabResponse>, ApiError> {
    let point = parse_grab(&parse_body(&body)?)?;
    let outcome = state.orchestrator.grab(point.x, point.y).await;

    Ok(Json(GrabResponse {
        ok: true,
        matched: outcome.matched,
        object: outcome.object,
    }))
}

/// Handler for `POST /layout` and `POST /objects_layout`.
async fn handle_layout(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> std::result::Result<Json<LayoutResponse>, ApiError> {
    let objects = parse_layout(&parse_body(&body)?)?;
    let ack = state.orchestrator.set_layout(objects).await;

    Ok(Json(LayoutResponse {
        ok: true,
        count: ack.count,
        persisted: ack.persisted,
    }))
}

/// Handler for `POST /alert`.
async fn handle_alert(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> std::result::Result<Json<AlertResponse>, ApiError> {
    let level = parse_level(&parse_body(&body)?)?;
    let level = state.orchestrator.set_alert_level(level).await;

    Ok(Json(AlertResponse { ok: true, level }))
}

async fn handle_ambient_start(State(state): State<Arc<AppState>>) -> Json<OkResponse> {
    state.orchestrator.ambient_start().await;
    Json(OkResponse { ok: true })
}

async fn handle_ambient_stop(State(state): State<Arc<AppState>>) -> Json<OkResponse> {
    state.orchestrator.ambient_stop().await;
    Json(OkResponse { ok: true })
}

async fn handle_refresh(State(state): State<Arc<AppState>>) -> Json<OkResponse> {
    state.orchestrator.refresh_all().await;
    Json(OkResponse { ok: true })
}

/// Handler for `GET /objects`.
async fn handle_objects(State(state): State<Arc<AppState>>) -> Json<Vec<CatalogItem>> {
    Json(state.catalog.items().to_vec())
}

/// Handler for `GET /state`.
async fn handle_state(State(state): State<Arc<AppState>>) -> Json<SnapshotPayload> {
    Json(state.orchestrator.snapshot().await)
}

// ============================================================================
// Tests
// ============================================================================
