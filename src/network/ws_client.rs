use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{http::StatusCode, Error as WsError, Message},
};
use tracing::{debug, info, warn};

use crate::models::{message::NetworkMessage, room::RoomCode};
use crate::network::{
    connection::{ConnectionLayer, Inbound, NetworkError},
    directory::HOST_LINK,
};

/// Client side of the WebSocket transport.
pub struct WsClient {
    base_url: String,
    connect_timeout: Duration,
    outbound: Option<UnboundedSender<String>>,
    reader: Option<JoinHandle<()>>,
    inbox_tx: UnboundedSender<Inbound>,
    inbox_rx: Option<UnboundedReceiver<Inbound>>,
}

impl WsClient {
    /// `base_url` is the host's origin, e.g. `ws://127.0.0.1:8080`.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        WsClient {
            base_url: base_url.into(),
            connect_timeout,
            outbound: None,
            reader: None,
            inbox_tx,
            inbox_rx: Some(inbox_rx),
        }
    }

    pub fn room_url(&self, room: &RoomCode) -> String {
        format!(
            "{}/api/room/{}/ws",
            self.base_url.trim_end_matches('/'),
            room
        )
    }
}

impl ConnectionLayer for WsClient {
    async fn listen(&mut self, _room: &RoomCode) -> Result<(), NetworkError> {
        Err(NetworkError::Unsupported("listen"))
    }

    async fn connect(&mut self, room: &RoomCode) -> Result<(), NetworkError> {
        if self.outbound.is_some() {
            return Err(NetworkError::Unsupported("connect while attached"));
        }
        let url = self.room_url(room);
        let (socket, _) = match timeout(self.connect_timeout, connect_async(url.as_str())).await {
            Err(_) => return Err(NetworkError::Timeout),
            Ok(Err(WsError::Http(response))) if response.status() == StatusCode::NOT_FOUND => {
                return Err(NetworkError::RoomNotFound(room.clone()))
            }
            Ok(Err(e)) => return Err(NetworkError::WebSocket(e.to_string())),
            Ok(Ok(pair)) => pair,
        };
        info!(url = %url, "connected");

        let (mut sink, mut stream) = socket.split();
        let (outbound, mut frames) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = frames.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!("failed to write frame: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let inbox = self.inbox_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match NetworkMessage::decode(&text) {
                        Ok(message) => {
                            let event = Inbound::Message {
                                from: HOST_LINK,
                                message,
                            };
                            if inbox.send(event).is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("dropping undecodable frame from host: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("connection error: {}", e);
                        break;
                    }
                }
            }
            debug!("host link closed");
            let _ = inbox.send(Inbound::Closed(HOST_LINK));
        });

        self.outbound = Some(outbound);
        self.reader = Some(reader);
        Ok(())
    }

    fn send(&self, message: &NetworkMessage) -> Result<(), NetworkError> {
        let outbound = self.outbound.as_ref().ok_or(NetworkError::NotConnected)?;
        outbound
            .send(message.encode()?)
            .map_err(|_| NetworkError::NotConnected)
    }

    fn subscribe(&mut self) -> Option<UnboundedReceiver<Inbound>> {
        self.inbox_rx.take()
    }

    fn disconnect(&mut self) {
        // dropping the queue lets the writer close the socket
        self.outbound = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
