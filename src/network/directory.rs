use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::models::{message::NetworkMessage, room::RoomCode};
use crate::network::connection::{Inbound, NetworkError};

pub type LinkId = u64;

/// Link id a client uses for its single link to the host.
pub const HOST_LINK: LinkId = 0;

/// Raw traffic from a host's links, before relaying and decoding.
#[derive(Debug)]
pub enum LinkSignal {
    Frame { from: LinkId, text: String },
    Closed(LinkId),
}

/// Outbound queues of every client attached to a room.
#[derive(Clone, Default)]
pub struct LinkTable {
    inner: Arc<LinkTableInner>,
}

#[derive(Default)]
struct LinkTableInner {
    next_id: AtomicU64,
    links: Mutex<HashMap<LinkId, UnboundedSender<String>>>,
}

impl LinkTable {
    fn links(&self) -> MutexGuard<'_, HashMap<LinkId, UnboundedSender<String>>> {
        self.inner
            .links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches a new client and returns its id and its outbound queue.
    pub fn add(&self) -> (LinkId, UnboundedReceiver<String>) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.links().insert(id, tx);
        (id, rx)
    }

    pub fn remove(&self, id: LinkId) -> bool {
        self.links().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.links().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues `text` on every link except `except`. Links whose receiver is
    /// gone are dropped. Returns how many links got the frame.
    pub fn send_all(&self, text: &str, except: Option<LinkId>) -> usize {
        let mut links = self.links();
        let mut delivered = 0;
        links.retain(|id, tx| {
            if Some(*id) == except {
                return true;
            }
            match tx.send(text.to_string()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    /// Drops every link, which ends each client's outbound stream.
    pub fn clear(&self) {
        self.links().clear();
    }
}

/// A room open for links: where frames go in, and who is attached.
#[derive(Clone)]
pub struct RoomEndpoint {
    pub links: LinkTable,
    pub signals: UnboundedSender<LinkSignal>,
}

/// Rooms currently hosted in this process, by code.
#[derive(Clone, Default)]
pub struct RoomDirectory {
    rooms: Arc<Mutex<HashMap<RoomCode, RoomEndpoint>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<RoomCode, RoomEndpoint>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, room: &RoomCode, endpoint: RoomEndpoint) -> Result<(), NetworkError> {
        let mut rooms = self.rooms();
        if rooms.contains_key(room) {
            return Err(NetworkError::RoomTaken(room.clone()));
        }
        rooms.insert(room.clone(), endpoint);
        info!(room = %room, "room registered");
        Ok(())
    }

    pub fn lookup(&self, room: &RoomCode) -> Option<RoomEndpoint> {
        self.rooms().get(room).cloned()
    }

    pub fn remove(&self, room: &RoomCode) -> Option<RoomEndpoint> {
        let removed = self.rooms().remove(room);
        if removed.is_some() {
            info!(room = %room, "room closed");
        }
        removed
    }

    pub fn codes(&self) -> Vec<RoomCode> {
        self.rooms().keys().cloned().collect()
    }
}

/// Host side of an open room: the endpoint handed to the directory and the
/// task that relays and decodes what arrives on it.
pub struct HostedRoom {
    pub room: RoomCode,
    pub links: LinkTable,
    pump: JoinHandle<()>,
}

impl HostedRoom {
    /// Registers `room` and starts relaying into `inbox`.
    pub fn open(
        directory: &RoomDirectory,
        room: &RoomCode,
        inbox: UnboundedSender<Inbound>,
    ) -> Result<Self, NetworkError> {
        let links = LinkTable::default();
        let (signals, signals_rx) = mpsc::unbounded_channel();
        directory.register(
            room,
            RoomEndpoint {
                links: links.clone(),
                signals,
            },
        )?;
        let pump = spawn_pump(signals_rx, links.clone(), inbox);
        Ok(HostedRoom {
            room: room.clone(),
            links,
            pump,
        })
    }

    pub fn broadcast(&self, message: &NetworkMessage) -> Result<(), NetworkError> {
        let text = message.encode()?;
        let delivered = self.links.send_all(&text, None);
        debug!(room = %self.room, kind = message.tag(), delivered, "broadcast");
        Ok(())
    }

    pub fn close(self, directory: &RoomDirectory) {
        directory.remove(&self.room);
        self.links.clear();
        self.pump.abort();
    }
}

/// Relays each frame verbatim to every other link, then decodes it for the
/// host session.
pub fn spawn_pump(
    mut signals: UnboundedReceiver<LinkSignal>,
    links: LinkTable,
    inbox: UnboundedSender<Inbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            let event = match signal {
                LinkSignal::Frame { from, text } => {
                    links.send_all(&text, Some(from));
                    match NetworkMessage::decode(&text) {
                        Ok(message) => Inbound::Message { from, message },
                        Err(e) => {
                            warn!(link = from, "dropping undecodable frame: {}", e);
                            continue;
                        }
                    }
                }
                LinkSignal::Closed(id) => {
                    links.remove(id);
                    Inbound::Closed(id)
                }
            };
            if inbox.send(event).is_err() {
                break;
            }
        }
    })
}
