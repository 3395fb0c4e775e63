use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::{models::room::RoomCode, services::room_service, state::AppState, utils::websocket};

pub fn routes(state: AppState) -> Router {
    Router::new()
        // curl http://localhost:8080/api/room/rooms
        .route("/rooms", get(get_rooms))
        // curl http://localhost:8080/api/room/{roomid}
        .route("/:roomid", get(get_room_info))
        // websocat ws://localhost:8080/api/room/{roomid}/ws
        .route("/:roomid/ws", get(websocket::handler))
        .with_state(state)
}

async fn get_rooms(State(state): State<AppState>) -> impl IntoResponse {
    let rooms = room_service::get_rooms(&state).await;
    (StatusCode::OK, Json(rooms))
}

async fn get_room_info(State(state): State<AppState>, Path(room_id): Path<String>) -> Response {
    let room = RoomCode(room_id);
    match room_service::get_room_info(&state, &room).await {
        Some(summary) => (StatusCode::OK, Json(summary)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(format!("Room {} not found", room)),
        )
            .into_response(),
    }
}
