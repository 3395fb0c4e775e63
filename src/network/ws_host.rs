use std::net::SocketAddr;
use tokio::{
    net::TcpListener,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{error, info};

use crate::models::{message::NetworkMessage, room::RoomCode};
use crate::network::{
    connection::{ConnectionLayer, Inbound, NetworkError},
    directory::HostedRoom,
};
use crate::{app, state::AppState};

/// Host side of the WebSocket transport. The first `listen` binds the HTTP
/// server, clients then reach the room at `/api/room/:roomid/ws`.
pub struct WsHost {
    state: AppState,
    bind_addr: SocketAddr,
    local_addr: Option<SocketAddr>,
    listener: Option<TcpListener>,
    server: Option<JoinHandle<()>>,
    hosted: Option<HostedRoom>,
    inbox_tx: UnboundedSender<Inbound>,
    inbox_rx: Option<UnboundedReceiver<Inbound>>,
}

impl WsHost {
    pub fn new(state: AppState, bind_addr: SocketAddr) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        WsHost {
            state,
            bind_addr,
            local_addr: None,
            listener: None,
            server: None,
            hosted: None,
            inbox_tx,
            inbox_rx: Some(inbox_rx),
        }
    }

    /// Binds right away so the address is known before the room opens.
    pub async fn bind(state: AppState, bind_addr: SocketAddr) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(bind_addr).await?;
        let mut host = Self::new(state, bind_addr);
        host.local_addr = Some(listener.local_addr()?);
        host.listener = Some(listener);
        Ok(host)
    }

    /// Address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn app_state(&self) -> &AppState {
        &self.state
    }

    async fn serve(&mut self) -> Result<(), NetworkError> {
        if self.server.is_some() {
            return Ok(());
        }
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => TcpListener::bind(self.bind_addr).await?,
        };
        let addr = listener.local_addr()?;
        let router = app::create_app(self.state.clone());
        self.server = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("server stopped: {}", e);
            }
        }));
        self.local_addr = Some(addr);
        info!("listening on http://{}", addr);
        Ok(())
    }
}

impl ConnectionLayer for WsHost {
    async fn listen(&mut self, room: &RoomCode) -> Result<(), NetworkError> {
        if self.hosted.is_some() {
            return Err(NetworkError::Unsupported("listen while hosting"));
        }
        let hosted = HostedRoom::open(&self.state.rooms, room, self.inbox_tx.clone())?;
        if let Err(e) = self.serve().await {
            hosted.close(&self.state.rooms);
            return Err(e);
        }
        self.hosted = Some(hosted);
        Ok(())
    }

    async fn connect(&mut self, _room: &RoomCode) -> Result<(), NetworkError> {
        Err(NetworkError::Unsupported("connect"))
    }

    fn send(&self, message: &NetworkMessage) -> Result<(), NetworkError> {
        self.hosted
            .as_ref()
            .ok_or(NetworkError::NotConnected)?
            .broadcast(message)
    }

    fn subscribe(&mut self) -> Option<UnboundedReceiver<Inbound>> {
        self.inbox_rx.take()
    }

    fn disconnect(&mut self) {
        if let Some(hosted) = self.hosted.take() {
            hosted.close(&self.state.rooms);
        }
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

impl Drop for WsHost {
    fn drop(&mut self) {
        self.disconnect();
    }
}
