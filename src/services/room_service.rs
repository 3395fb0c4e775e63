use crate::{
    models::room::{RoomCode, RoomSummary},
    state::AppState,
};

pub async fn get_room_info(state: &AppState, room: &RoomCode) -> Option<RoomSummary> {
    let endpoint = state.rooms.lookup(room)?;
    let snapshot = state
        .sessions
        .lock()
        .await
        .get(room)
        .map(|rx| rx.borrow().clone())
        .filter(|s| s.room_code == *room);

    Some(RoomSummary {
        room_code: room.clone(),
        links: endpoint.links.len(),
        phase: snapshot.as_ref().map(|s| s.phase),
        players: snapshot.as_ref().map(|s| s.players.len()),
    })
}

pub async fn get_rooms(state: &AppState) -> Vec<RoomSummary> {
    let mut codes = state.rooms.codes();
    codes.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    let mut rooms = Vec::with_capacity(codes.len());
    for code in codes {
        if let Some(summary) = get_room_info(state, &code).await {
            rooms.push(summary);
        }
    }
    rooms
}
