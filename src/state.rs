use std::{collections::HashMap, sync::Arc};
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::models::{game::GameState, room::RoomCode};
use crate::network::RoomDirectory;

#[derive(Clone, Default)]
pub struct AppState {
    pub rooms: RoomDirectory,
    /// Published host state per room, for the HTTP probe.
    pub sessions: Arc<Mutex<HashMap<RoomCode, watch::Receiver<GameState>>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `state` under `room` until the session leaves that room or
    /// stops publishing.
    pub async fn track_session(&self, room: RoomCode, state: watch::Receiver<GameState>) {
        let mut updates = state.clone();
        self.sessions.lock().await.insert(room.clone(), state);

        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            let _ = updates.wait_for(|s| s.room_code != room).await;
            let mut sessions = sessions.lock().await;
            // the code may have been handed to a newer session meanwhile
            if sessions.get(&room).is_some_and(|rx| rx.same_channel(&updates)) {
                sessions.remove(&room);
                debug!(room = %room, "session no longer tracked");
            }
        });
    }

    pub async fn is_tracked(&self, room: &RoomCode) -> bool {
        self.sessions.lock().await.contains_key(room)
    }
}
