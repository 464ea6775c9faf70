//! REST routes and the WebSocket upgrade.
//!
//! Every response body is an envelope: `{"error": false, "data": ...}` on
//! success, `{"error": true, "message": "..."}` on failure.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
        ws::WebSocketUpgrade,
    },
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use derive_getters::Getters;
use drones_game::{
    MatchError, MatchId, MatchLocks, MatchService, MatchStore, Move, PlayerId, PlayerService,
    PlayerStore,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tracing::{debug, error, info, instrument, warn};

use crate::hub::{EventHub, serve_socket};

/// Header consulted for the submitting player when body and query omit it.
pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// Shared handler state.
#[derive(Debug, Clone, Getters)]
pub struct AppState {
    matches: MatchService,
    players: PlayerService,
    hub: EventHub,
}

impl AppState {
    /// Wires both services to one store and routes match events to `hub`.
    #[instrument(skip_all)]
    pub fn assemble<S>(store: Arc<S>, locks: MatchLocks, hub: EventHub) -> Self
    where
        S: PlayerStore + MatchStore + 'static,
    {
        info!(lock_timeout_ms = locks.timeout().as_millis() as u64, "Assembling app state");
        let players: Arc<dyn PlayerStore> = store.clone();
        let matches: Arc<dyn MatchStore> = store;
        Self {
            matches: MatchService::new(matches, players.clone())
                .with_publisher(Arc::new(hub.clone()))
                .with_locks(locks),
            players: PlayerService::new(players),
            hub,
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/players", post(create_player).get(list_players))
        .route("/players/{id}/stats", get(player_stats))
        .route("/players/{id}/matches", get(player_matches))
        .route("/matches", post(create_match).get(list_matches))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/move", post(submit_move))
        .route("/ws", get(ws_upgrade))
        .layer(ServiceBuilder::new().map_request(log_request))
        .with_state(state)
}

fn log_request(req: Request<Body>) -> Request<Body> {
    debug!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
    req
}

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    error: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: bool,
    message: String,
}

fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(Envelope { error: false, data })).into_response()
}

/// A [`MatchError`] rendered as an HTTP failure.
#[derive(Debug)]
pub struct ApiError(MatchError);

impl ApiError {
    /// HTTP status for each error class.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MatchError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            MatchError::NotFound(_) => StatusCode::NOT_FOUND,
            MatchError::Conflict(_) => StatusCode::CONFLICT,
            MatchError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            MatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(MatchError::invalid_argument(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(MatchError::invalid_argument(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "Request rejected");
        }
        let body = ErrorEnvelope {
            error: true,
            message: self.0.message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

/// An id supplied either as a JSON number or as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn resolve(&self, what: &str) -> Result<i32, MatchError> {
        match self {
            Self::Number(n) => i32::try_from(*n)
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| MatchError::invalid_argument(format!("Invalid {} id '{}'", what, n))),
            Self::Text(s) => parse_id(s, what),
        }
    }
}

/// Parses a positive integer id from path, query or header text.
fn parse_id(raw: &str, what: &str) -> Result<i32, MatchError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| MatchError::invalid_argument(format!("Invalid {} id '{}'", what, raw)))
}

#[instrument]
async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct CreatePlayerBody {
    #[serde(default)]
    name: Option<String>,
}

#[instrument(skip(state, body))]
async fn create_player(
    State(state): State<AppState>,
    body: Result<Json<CreatePlayerBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let player = state
        .players
        .register(body.name.as_deref().unwrap_or_default())
        .await?;
    Ok(respond(StatusCode::CREATED, player))
}

#[instrument(skip(state))]
async fn list_players(State(state): State<AppState>) -> ApiResult {
    Ok(respond(StatusCode::OK, state.players.list().await?))
}

#[instrument(skip(state))]
async fn player_stats(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id: PlayerId = parse_id(&id, "player")?;
    Ok(respond(StatusCode::OK, state.players.stats(id).await?))
}

#[instrument(skip(state))]
async fn player_matches(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id: PlayerId = parse_id(&id, "player")?;
    state.players.stats(id).await?;
    Ok(respond(
        StatusCode::OK,
        state.matches.list_matches_by_player(id).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct CreateMatchBody {
    #[serde(rename = "playerA")]
    player_a: RawId,
    #[serde(rename = "playerB")]
    player_b: RawId,
}

#[instrument(skip(state, body))]
async fn create_match(
    State(state): State<AppState>,
    body: Result<Json<CreateMatchBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let player_a = body.player_a.resolve("player")?;
    let player_b = body.player_b.resolve("player")?;
    let created = state.matches.create_match(player_a, player_b).await?;
    Ok(respond(StatusCode::CREATED, created))
}

#[instrument(skip(state))]
async fn list_matches(State(state): State<AppState>) -> ApiResult {
    Ok(respond(StatusCode::OK, state.matches.list_matches().await?))
}

#[instrument(skip(state))]
async fn get_match(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id: MatchId = parse_id(&id, "match")?;
    Ok(respond(StatusCode::OK, state.matches.get_match(id).await?))
}

#[derive(Debug, Deserialize)]
struct MoveBody {
    #[serde(rename = "move", default)]
    played: Option<String>,
    #[serde(rename = "playerId", default)]
    player_id: Option<RawId>,
}

#[derive(Debug, Deserialize)]
struct MoveQuery {
    #[serde(rename = "playerId", default)]
    player_id: Option<String>,
}

/// Picks the submitting player from body, then query, then header.
fn submitting_player(
    body: &MoveBody,
    query: &MoveQuery,
    headers: &HeaderMap,
) -> Result<PlayerId, MatchError> {
    if let Some(raw) = &body.player_id {
        return raw.resolve("player");
    }
    if let Some(raw) = query.player_id.as_deref().filter(|s| !s.is_empty()) {
        return parse_id(raw, "player");
    }
    match headers.get(PLAYER_ID_HEADER) {
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| MatchError::invalid_argument("Invalid player id header"))?;
            parse_id(raw, "player")
        }
        None => Err(MatchError::invalid_argument("playerId required")),
    }
}

#[instrument(skip(state, headers, query, body))]
async fn submit_move(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    query: Result<Query<MoveQuery>, QueryRejection>,
    body: Result<Json<MoveBody>, JsonRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let Json(body) = body?;
    let match_id: MatchId = parse_id(&id, "match")?;
    let player = submitting_player(&body, &query, &headers)?;
    let played = match body.played.as_deref() {
        Some(literal) => Move::parse(literal)?,
        None => return Err(MatchError::invalid_argument("Move is required").into()),
    };

    debug!(match_id, player, %played, "Submitting move");
    let updated = state.matches.submit_move(match_id, player, played).await?;
    Ok(respond(StatusCode::OK, updated))
}

#[instrument(skip_all)]
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| serve_socket(socket, hub))
}
