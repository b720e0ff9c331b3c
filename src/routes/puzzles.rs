use axum::{
    Json, Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use axum_valid::Valid;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    dto::puzzle::{CreatePuzzleRequest, CreatePuzzleResponse, PuzzleResponse, ResultsResponse},
    error::{AppError, ServiceError},
    services::{puzzle_service, websocket_service},
    state::{SharedState, user_pool::UserDirectory},
};

/// Routes creating, inspecting and playing puzzles.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/puzzles/{id}", get(get_puzzle).post(create_puzzle))
        .route("/api/puzzles/{id}/results", get(puzzle_results))
        .route("/api/puzzles/{id}/ws", get(ws_handler))
}

/// Turn the picture uploaded under `id` into a shuffled puzzle.
#[utoipa::path(
    post,
    path = "/api/puzzles/{id}",
    tag = "puzzles",
    params(("id" = String, Path, description = "Uuid returned by the image upload")),
    request_body = CreatePuzzleRequest,
    responses(
        (status = 200, description = "Puzzle created", body = CreatePuzzleResponse),
        (status = 400, description = "Invalid grid size"),
        (status = 404, description = "Unknown image"),
        (status = 409, description = "Puzzle already exists")
    )
)]
pub async fn create_puzzle(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<CreatePuzzleRequest>>,
) -> Result<Json<CreatePuzzleResponse>, AppError> {
    Ok(Json(puzzle_service::create_puzzle(&state, &id, payload).await?))
}

/// Full state of a live puzzle.
#[utoipa::path(
    get,
    path = "/api/puzzles/{id}",
    tag = "puzzles",
    params(("id" = String, Path, description = "Puzzle identifier")),
    responses(
        (status = 200, description = "Puzzle state", body = PuzzleResponse),
        (status = 404, description = "Unknown puzzle")
    )
)]
pub async fn get_puzzle(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<PuzzleResponse>, AppError> {
    Ok(Json(puzzle_service::get_puzzle(&state, &id).await?))
}

/// Pieces contributed by each current participant.
#[utoipa::path(
    get,
    path = "/api/puzzles/{id}/results",
    tag = "puzzles",
    params(("id" = String, Path, description = "Puzzle identifier")),
    responses(
        (status = 200, description = "Scoreboard", body = ResultsResponse),
        (status = 404, description = "Unknown puzzle")
    )
)]
pub async fn puzzle_results(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ResultsResponse>, AppError> {
    Ok(Json(puzzle_service::puzzle_results(&state, &id).await?))
}

/// Query string of the websocket upgrade.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WsParams {
    /// Identifier of the connecting user.
    user: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/puzzles/{id}/ws",
    tag = "puzzles",
    params(("id" = String, Path, description = "Puzzle identifier"), WsParams),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Missing `user` parameter"),
        (status = 404, description = "Unknown puzzle or user")
    )
)]
/// Upgrade the HTTP connection into a puzzle session for `user`.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let user_id = params
        .user
        .filter(|user| !user.is_empty())
        .ok_or_else(|| ServiceError::InvalidInput("user parameter not supplied".into()))?;
    let puzzle = puzzle_service::lookup(&state, &id)?;
    if !state.users().contains(&user_id) {
        return Err(ServiceError::NotFound(format!("user `{user_id}` not found")).into());
    }

    info!(puzzle_id = %id, user_id = %user_id, "upgrading puzzle websocket");
    let shared_state = state.clone();
    Ok(ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(shared_state, puzzle, user_id, socket)
    }))
}
