use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tracing::{info, warn};

use crate::models::room::RoomCode;
use crate::network::directory::{LinkSignal, RoomEndpoint};
use crate::state::AppState;

pub async fn handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let room = RoomCode(room_id);
    match state.rooms.lookup(&room) {
        Some(endpoint) => ws
            .on_upgrade(move |socket| handle_socket(socket, endpoint, room))
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(format!("Room {} not found", room)),
        )
            .into_response(),
    }
}

/// Bridges one socket to the room: text frames go to the host's relay, and
/// whatever the room queues for this link goes back out.
pub async fn handle_socket(ws: WebSocket, endpoint: RoomEndpoint, room: RoomCode) {
    let (link, mut outbound) = endpoint.links.add();
    info!(room = %room, link, "websocket link opened");

    let (mut sender, mut receiver) = ws.split();

    let room_for_send = room.clone();
    let send_task = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if let Err(e) = sender.send(Message::Text(text)).await {
                warn!(room = %room_for_send, link, "error sending frame: {}", e);
                break;
            }
        }
        let _ = sender.close().await;
    });

    let signals = endpoint.signals.clone();
    let receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if signals.send(LinkSignal::Frame { from: link, text }).is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let _ = receive_task.await;
    let _ = endpoint.signals.send(LinkSignal::Closed(link));
    endpoint.links.remove(link);
    let _ = send_task.await;
    info!(room = %room, link, "websocket link closed");
}
