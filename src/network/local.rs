use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::models::{message::NetworkMessage, room::RoomCode};
use crate::network::{
    connection::{ConnectionLayer, Inbound, NetworkError},
    directory::{HostedRoom, LinkId, LinkSignal, RoomDirectory, HOST_LINK},
};

enum Attachment {
    Host(HostedRoom),
    Client {
        room: RoomCode,
        link: LinkId,
        signals: UnboundedSender<LinkSignal>,
        reader: JoinHandle<()>,
    },
}

/// In-process transport. Every peer sharing a [`RoomDirectory`] can reach
/// the rooms hosted in it.
pub struct LocalPeer {
    directory: RoomDirectory,
    attachment: Option<Attachment>,
    inbox_tx: UnboundedSender<Inbound>,
    inbox_rx: Option<UnboundedReceiver<Inbound>>,
}

impl LocalPeer {
    pub fn new(directory: RoomDirectory) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        LocalPeer {
            directory,
            attachment: None,
            inbox_tx,
            inbox_rx: Some(inbox_rx),
        }
    }
}

impl ConnectionLayer for LocalPeer {
    async fn listen(&mut self, room: &RoomCode) -> Result<(), NetworkError> {
        if self.attachment.is_some() {
            return Err(NetworkError::Unsupported("listen while attached"));
        }
        let hosted = HostedRoom::open(&self.directory, room, self.inbox_tx.clone())?;
        self.attachment = Some(Attachment::Host(hosted));
        Ok(())
    }

    async fn connect(&mut self, room: &RoomCode) -> Result<(), NetworkError> {
        if self.attachment.is_some() {
            return Err(NetworkError::Unsupported("connect while attached"));
        }
        let endpoint = self
            .directory
            .lookup(room)
            .ok_or_else(|| NetworkError::RoomNotFound(room.clone()))?;
        let (link, mut frames) = endpoint.links.add();

        let inbox = self.inbox_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(text) = frames.recv().await {
                match NetworkMessage::decode(&text) {
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
                }
            }
            let _ = inbox.send(Inbound::Closed(HOST_LINK));
        });

        info!(room = %room, link, "connected to local room");
        self.attachment = Some(Attachment::Client {
            room: room.clone(),
            link,
            signals: endpoint.signals,
            reader,
        });
        Ok(())
    }

    fn send(&self, message: &NetworkMessage) -> Result<(), NetworkError> {
        match &self.attachment {
            Some(Attachment::Host(hosted)) => hosted.broadcast(message),
            Some(Attachment::Client { link, signals, .. }) => {
                let text = message.encode()?;
                signals
                    .send(LinkSignal::Frame { from: *link, text })
                    .map_err(|_| NetworkError::NotConnected)
            }
            None => Err(NetworkError::NotConnected),
        }
    }

    fn subscribe(&mut self) -> Option<UnboundedReceiver<Inbound>> {
        self.inbox_rx.take()
    }

    fn disconnect(&mut self) {
        match self.attachment.take() {
            Some(Attachment::Host(hosted)) => hosted.close(&self.directory),
            Some(Attachment::Client {
                room,
                link,
                signals,
                reader,
            }) => {
                let _ = signals.send(LinkSignal::Closed(link));
                reader.abort();
                debug!(room = %room, link, "left local room");
            }
            None => {}
        }
    }
}

impl Drop for LocalPeer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::player::PlayerId;

    #[tokio::test]
    async fn client_frames_reach_host_and_other_clients() {
        let directory = RoomDirectory::new();
        let room = RoomCode::from("5150");
        let mut host = LocalPeer::new(directory.clone());
        let mut alice = LocalPeer::new(directory.clone());
        let mut bob = LocalPeer::new(directory.clone());

        host.listen(&room).await.unwrap();
        alice.connect(&room).await.unwrap();
        bob.connect(&room).await.unwrap();
        let mut host_rx = host.subscribe().unwrap();
        let mut bob_rx = bob.subscribe().unwrap();
        assert!(host.subscribe().is_none());

        let ready = NetworkMessage::PlayerReady(PlayerId::from("alice"));
        alice.send(&ready).unwrap();

        match host_rx.recv().await {
            Some(Inbound::Message { message, .. }) => assert_eq!(message, ready),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            bob_rx.recv().await,
            Some(Inbound::Message {
                from: HOST_LINK,
                message: ready,
            })
        );

        host.send(&NetworkMessage::Restart).unwrap();
        assert_eq!(
            bob_rx.recv().await,
            Some(Inbound::Message {
                from: HOST_LINK,
                message: NetworkMessage::Restart,
            })
        );
    }

    #[tokio::test]
    async fn unknown_room_and_taken_code_fail() {
        let directory = RoomDirectory::new();
        let room = RoomCode::from("7777");
        let mut stray = LocalPeer::new(directory.clone());
        assert!(matches!(
            stray.connect(&room).await,
            Err(NetworkError::RoomNotFound(_))
        ));

        let mut first = LocalPeer::new(directory.clone());
        let mut second = LocalPeer::new(directory.clone());
        first.listen(&room).await.unwrap();
        assert!(matches!(
            second.listen(&room).await,
            Err(NetworkError::RoomTaken(_))
        ));
    }

    #[tokio::test]
    async fn host_leaving_closes_client_links() {
        let directory = RoomDirectory::new();
        let room = RoomCode::from("8080");
        let mut host = LocalPeer::new(directory.clone());
        let mut client = LocalPeer::new(directory.clone());
        host.listen(&room).await.unwrap();
        client.connect(&room).await.unwrap();
        let mut client_rx = client.subscribe().unwrap();

        host.disconnect();
        assert_eq!(client_rx.recv().await, Some(Inbound::Closed(HOST_LINK)));
        assert!(directory.lookup(&room).is_none());
    }

    #[tokio::test]
    async fn client_leaving_is_reported_to_the_host() {
        let directory = RoomDirectory::new();
        let room = RoomCode::from("9090");
        let mut host = LocalPeer::new(directory.clone());
        let mut client = LocalPeer::new(directory.clone());
        host.listen(&room).await.unwrap();
        client.connect(&room).await.unwrap();
        let mut host_rx = host.subscribe().unwrap();

        client.disconnect();
        assert!(matches!(host_rx.recv().await, Some(Inbound::Closed(_))));
        assert!(matches!(client.send(&NetworkMessage::Restart), Err(NetworkError::NotConnected)));
    }
}
