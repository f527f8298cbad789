use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use domain::{ParticipantRole, RoomId};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{error::ApiError, state::AppState, ws_connection::SessionConnection};

const ROOM_NOT_FOUND_PAGE: &str = "<h1>Room Not Found</h1>";

#[derive(Debug, Serialize)]
struct RoomEntryView {
    #[serde(rename = "roomID")]
    room_id: RoomId,
    role: ParticipantRole,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/room/{role}/{room_id}", get(room_entry))
        .route("/ws", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 房间入口：`p` 为主讲人，`a` 为参会者；其余角色与不存在的房间同样返回 404 页面
async fn room_entry(
    State(state): State<AppState>,
    Path((role, room_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let room_id = RoomId::parse(room_id)?;
    let Ok(role) = role.parse::<ParticipantRole>() else {
        return Ok(room_not_found());
    };

    if !state.router.room_exists(&room_id).await {
        return Ok(room_not_found());
    }
    Ok(Json(RoomEntryView { room_id, role }).into_response())
}

fn room_not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(ROOM_NOT_FOUND_PAGE)).into_response()
}

async fn websocket_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| SessionConnection::new(socket, state).run())
}
