use chrono::Utc;
use rand::rngs::StdRng;
use std::{collections::HashMap, future::pending, pin::Pin, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep},
};
use tracing::{debug, info, warn};

use crate::models::{
    config::{GameConfig, ServerConfig},
    game::{GamePhase, GameState, VotePayload},
    message::{EndTurnPayload, NetworkMessage, SubmitVotePayload},
    player::{Player, PlayerId},
    room::RoomCode,
};
use crate::network::{ConnectionLayer, Inbound, LinkId, NetworkError};
use crate::services::{
    authority::{Authority, Replica},
    feedback::{cues_between, Cue, FeedbackSink},
    game_service::{Effect, Intent, Rejection},
    word_pack_registry::WordPackRegistry,
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no free room code after {attempts} attempts")]
    RoomCreationFailed { attempts: u32 },
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("session closed")]
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    tick: Duration,
    debounce: Duration,
    reveal: Duration,
}

impl From<&ServerConfig> for Timing {
    fn from(config: &ServerConfig) -> Self {
        Timing {
            tick: config.tick_interval,
            debounce: config.sync_debounce,
            reveal: config.reveal_delay,
        }
    }
}

async fn next_tick(tick: &mut Option<Interval>) {
    match tick {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

fn publish(
    tx: &watch::Sender<GameState>,
    feedback: &dyn FeedbackSink,
    local: &PlayerId,
    before: &GameState,
    after: &GameState,
) {
    for cue in cues_between(local, before, after) {
        feedback.cue(cue);
    }
    tx.send_replace(after.clone());
}

enum HostCommand {
    Dispatch {
        intent: Intent,
        reply: oneshot::Sender<Result<(), Rejection>>,
    },
    Leave(oneshot::Sender<()>),
}

/// The single writer of a room. Owns the canonical state, the turn clock and
/// the debounced broadcast.
struct HostSession<C> {
    layer: C,
    authority: Authority,
    players_by_link: HashMap<LinkId, PlayerId>,
    state_tx: watch::Sender<GameState>,
    feedback: Arc<dyn FeedbackSink>,
    timing: Timing,
    tick: Option<Interval>,
    sync_at: Option<Pin<Box<Sleep>>>,
    reveal_at: Option<Pin<Box<Sleep>>>,
}

impl<C: ConnectionLayer> HostSession<C> {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<Inbound>,
        mut commands: mpsc::UnboundedReceiver<HostCommand>,
    ) {
        loop {
            tokio::select! {
                Some(event) = inbox.recv() => self.on_inbound(event),
                command = commands.recv() => match command {
                    Some(HostCommand::Dispatch { intent, reply }) => {
                        let result = self.on_local(intent);
                        let _ = reply.send(result);
                    }
                    Some(HostCommand::Leave(done)) => {
                        let _ = done.send(());
                        break;
                    }
                    None => break,
                },
                _ = next_tick(&mut self.tick) => {
                    if let Err(rejection) = self.apply(Intent::Tick(Utc::now())) {
                        debug!(%rejection, "tick ignored");
                    }
                }
                _ = fire(&mut self.sync_at) => {
                    self.sync_at = None;
                    self.broadcast_state();
                }
                _ = fire(&mut self.reveal_at) => {
                    self.reveal_at = None;
                    if let Err(rejection) = self.apply(Intent::RevealResults) {
                        warn!(%rejection, "reveal skipped");
                    }
                }
            }
        }

        info!(room = %self.authority.state().room_code, "host left the room");
        self.layer.disconnect();
        let before = self.authority.state().clone();
        let mut after = before.clone();
        after.phase = GamePhase::Home;
        after.room_code = RoomCode::default();
        after.players.clear();
        let local = self.authority.local_player().clone();
        publish(&self.state_tx, self.feedback.as_ref(), &local, &before, &after);
    }

    fn apply(&mut self, intent: Intent) -> Result<(), Rejection> {
        let before = self.authority.state().clone();
        let effects = self.authority.dispatch(intent)?;
        for effect in effects {
            match effect {
                Effect::ScheduleReveal => {
                    self.reveal_at = Some(Box::pin(sleep(self.timing.reveal)));
                }
                Effect::AnnounceRestart => self.send(&NetworkMessage::Restart),
            }
        }
        self.arm_clock();
        self.sync_at = Some(Box::pin(sleep(self.timing.debounce)));
        let local = self.authority.local_player().clone();
        publish(
            &self.state_tx,
            self.feedback.as_ref(),
            &local,
            &before,
            self.authority.state(),
        );
        Ok(())
    }

    /// The clock runs only during GAME_ROUND and is never armed twice.
    fn arm_clock(&mut self) {
        let in_round = self.authority.state().phase == GamePhase::GameRound;
        match (&self.tick, in_round) {
            (None, true) => {
                let mut interval = interval_at(Instant::now() + self.timing.tick, self.timing.tick);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.tick = Some(interval);
                debug!("turn clock armed");
            }
            (Some(_), false) => {
                self.tick = None;
                debug!("turn clock stopped");
            }
            _ => {}
        }
    }

    fn on_local(&mut self, intent: Intent) -> Result<(), Rejection> {
        self.feedback.cue(Cue::Click);
        let message = intent.to_message();
        match self.apply(intent) {
            Ok(()) => {
                if let Some(message) = message {
                    self.send(&message);
                }
                Ok(())
            }
            Err(rejection) => {
                self.feedback.cue(Cue::Error);
                debug!(%rejection, "local intent rejected");
                Err(rejection)
            }
        }
    }

    fn on_inbound(&mut self, event: Inbound) {
        match event {
            Inbound::Message { from, message } => {
                let Some(intent) = Intent::from_message(&message, Utc::now()) else {
                    warn!(link = from, kind = message.tag(), "host-only message from a client");
                    return;
                };
                if intent.actor() == Some(self.authority.local_player()) {
                    let rejection = Rejection::NotHost(self.authority.local_player().clone());
                    warn!(link = from, %rejection, "impersonation attempt");
                    return;
                }
                let joining = match &intent {
                    Intent::Join(player) => Some(player.id.clone()),
                    _ => None,
                };
                let result = self.apply(intent);
                if let Some(id) = joining {
                    if matches!(result, Ok(()) | Err(Rejection::AlreadyJoined(_))) {
                        self.players_by_link.insert(from, id);
                    }
                }
                match result {
                    Ok(()) => {}
                    Err(rejection) if rejection.is_duplicate() => {
                        debug!(link = from, %rejection, "duplicate absorbed");
                    }
                    Err(rejection) => warn!(link = from, %rejection, "intent rejected"),
                }
            }
            Inbound::Closed(link) => match self.players_by_link.remove(&link) {
                Some(player) => {
                    if let Err(rejection) = self.apply(Intent::PlayerDisconnected(player)) {
                        debug!(link, %rejection, "disconnect ignored");
                    }
                }
                None => debug!(link, "link closed before joining"),
            },
        }
    }

    fn send(&self, message: &NetworkMessage) {
        if let Err(e) = self.layer.send(message) {
            warn!(kind = message.tag(), "send failed: {}", e);
        }
    }

    fn broadcast_state(&self) {
        self.send(&NetworkMessage::SyncState(Box::new(
            self.authority.state().clone(),
        )));
    }
}

/// Controls a hosted room from the local UI.
pub struct HostHandle {
    commands: mpsc::UnboundedSender<HostCommand>,
    state: watch::Receiver<GameState>,
    room_code: RoomCode,
    player_id: PlayerId,
    task: JoinHandle<()>,
}

impl HostHandle {
    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn state(&self) -> GameState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.state.clone()
    }

    async fn dispatch(&self, intent: Intent) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(HostCommand::Dispatch { intent, reply })
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }

    pub async fn start_game(&self) -> Result<(), SessionError> {
        self.dispatch(Intent::StartGame).await
    }

    pub async fn restart(&self) -> Result<(), SessionError> {
        self.dispatch(Intent::Restart).await
    }

    pub async fn update_settings(&self, config: GameConfig) -> Result<(), SessionError> {
        self.dispatch(Intent::UpdateSettings(config)).await
    }

    pub async fn ready(&self) -> Result<(), SessionError> {
        self.dispatch(Intent::PlayerReady(self.player_id.clone())).await
    }

    pub async fn end_turn(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.dispatch(Intent::EndTurn {
            player_id: self.player_id.clone(),
            text: text.into(),
            at: Utc::now(),
        })
        .await
    }

    pub async fn vote(
        &self,
        accused: PlayerId,
        teammate: Option<PlayerId>,
    ) -> Result<(), SessionError> {
        self.dispatch(Intent::SubmitVote {
            voter_id: self.player_id.clone(),
            vote: VotePayload {
                accused_outsider_id: accused,
                claimed_teammate_id: teammate,
            },
        })
        .await
    }

    /// Closes the room for everyone.
    pub async fn leave(self) {
        let (done, rx) = oneshot::channel();
        if self.commands.send(HostCommand::Leave(done)).is_ok() {
            let _ = rx.await;
        }
        let _ = self.task.await;
    }
}

/// Opens a room under a fresh code and starts the host session.
pub async fn host_room<C: ConnectionLayer>(
    mut layer: C,
    name: &str,
    avatar: &str,
    config: &ServerConfig,
    registry: Arc<WordPackRegistry>,
    mut rng: StdRng,
    feedback: Arc<dyn FeedbackSink>,
) -> Result<HostHandle, SessionError> {
    let attempts = config.room_code_attempts.max(1);
    let mut room_code = None;
    for attempt in 1..=attempts {
        let candidate = RoomCode::generate(&mut rng);
        match layer.listen(&candidate).await {
            Ok(()) => {
                room_code = Some(candidate);
                break;
            }
            Err(NetworkError::RoomTaken(code)) => {
                debug!(room = %code, attempt, "room code taken, retrying");
            }
            Err(e) => {
                feedback.cue(Cue::Error);
                return Err(e.into());
            }
        }
    }
    let Some(room_code) = room_code else {
        feedback.cue(Cue::Error);
        return Err(SessionError::RoomCreationFailed { attempts });
    };
    let inbox = layer.subscribe().ok_or(SessionError::Closed)?;

    let host = Player::host(PlayerId::generate(), name, avatar);
    let player_id = host.id.clone();
    let authority = Authority::open(room_code.clone(), host, config.default_game, registry, rng);
    let (state_tx, state) = watch::channel(authority.state().clone());
    let (commands, commands_rx) = mpsc::unbounded_channel();

    info!(room = %room_code, player = %player_id, "hosting room");
    let session = HostSession {
        layer,
        authority,
        players_by_link: HashMap::new(),
        state_tx,
        feedback,
        timing: Timing::from(config),
        tick: None,
        sync_at: None,
        reveal_at: None,
    };
    let task = tokio::spawn(session.run(inbox, commands_rx));

    Ok(HostHandle {
        commands,
        state,
        room_code,
        player_id,
        task,
    })
}

enum ClientCommand {
    Send {
        message: NetworkMessage,
        reply: oneshot::Sender<Result<(), NetworkError>>,
    },
    Leave(oneshot::Sender<()>),
}

struct ClientSession<C> {
    layer: C,
    replica: Replica,
    me: Player,
    state_tx: watch::Sender<GameState>,
    feedback: Arc<dyn FeedbackSink>,
    settle: Duration,
}

impl<C: ConnectionLayer> ClientSession<C> {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<Inbound>,
        mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    ) {
        let settle = sleep(self.settle);
        tokio::pin!(settle);
        let mut announced = false;

        loop {
            tokio::select! {
                _ = &mut settle, if !announced => {
                    announced = true;
                    let join = NetworkMessage::Join(self.me.clone());
                    if let Err(e) = self.layer.send(&join) {
                        self.feedback.cue(Cue::Error);
                        warn!("failed to announce join: {}", e);
                    }
                }
                event = inbox.recv() => match event {
                    Some(Inbound::Message { message, .. }) => {
                        let before = self.replica.state().clone();
                        if self.replica.absorb(&message) {
                            self.publish(&before);
                        }
                    }
                    Some(Inbound::Closed(_)) | None => {
                        warn!(room = %self.replica.state().room_code, "lost the host");
                        self.feedback.cue(Cue::Error);
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(ClientCommand::Send { message, reply }) => {
                        self.feedback.cue(Cue::Click);
                        let result = self.layer.send(&message);
                        match &result {
                            Ok(()) => {
                                let before = self.replica.state().clone();
                                if self.replica.predict(&message) {
                                    self.publish(&before);
                                }
                            }
                            Err(_) => self.feedback.cue(Cue::Error),
                        }
                        let _ = reply.send(result);
                    }
                    Some(ClientCommand::Leave(done)) => {
                        let _ = done.send(());
                        break;
                    }
                    None => break,
                },
            }
        }

        self.layer.disconnect();
        let before = self.replica.state().clone();
        self.replica.leave();
        self.publish(&before);
    }

    fn publish(&self, before: &GameState) {
        publish(
            &self.state_tx,
            self.feedback.as_ref(),
            self.replica.local_player(),
            before,
            self.replica.state(),
        );
    }
}

/// A joined room as seen from a client.
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    state: watch::Receiver<GameState>,
    player_id: PlayerId,
    task: JoinHandle<()>,
}

impl ClientHandle {
    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn state(&self) -> GameState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.state.clone()
    }

    async fn send(&self, message: NetworkMessage) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ClientCommand::Send { message, reply })
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }

    pub async fn ready(&self) -> Result<(), SessionError> {
        self.send(NetworkMessage::PlayerReady(self.player_id.clone()))
            .await
    }

    pub async fn end_turn(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(NetworkMessage::EndTurn(EndTurnPayload {
            player_id: self.player_id.clone(),
            text: text.into(),
        }))
        .await
    }

    pub async fn vote(
        &self,
        accused: PlayerId,
        teammate: Option<PlayerId>,
    ) -> Result<(), SessionError> {
        self.send(NetworkMessage::SubmitVote(SubmitVotePayload {
            voter_id: self.player_id.clone(),
            vote: VotePayload {
                accused_outsider_id: accused,
                claimed_teammate_id: teammate,
            },
        }))
        .await
    }

    pub async fn update_settings(&self, config: GameConfig) -> Result<(), SessionError> {
        self.send(NetworkMessage::UpdateSettings(config)).await
    }

    /// Disconnects and returns the mirror to HOME.
    pub async fn leave(self) {
        let (done, rx) = oneshot::channel();
        if self.commands.send(ClientCommand::Leave(done)).is_ok() {
            let _ = rx.await;
        }
        let _ = self.task.await;
    }
}

/// Connects to `room` and announces the player once the link settled.
pub async fn join_room<C: ConnectionLayer>(
    mut layer: C,
    room: &RoomCode,
    name: &str,
    avatar: &str,
    config: &ServerConfig,
    feedback: Arc<dyn FeedbackSink>,
) -> Result<ClientHandle, SessionError> {
    if let Err(e) = layer.connect(room).await {
        feedback.cue(Cue::Error);
        warn!(room = %room, "could not join: {}", e);
        return Err(e.into());
    }
    let inbox = layer.subscribe().ok_or(SessionError::Closed)?;

    let me = Player::new(PlayerId::generate(), name, avatar);
    let player_id = me.id.clone();
    let replica = Replica::joined(room.clone(), me.clone(), config.default_game);
    let (state_tx, state) = watch::channel(replica.state().clone());
    let (commands, commands_rx) = mpsc::unbounded_channel();

    info!(room = %room, player = %player_id, "joined room");
    let session = ClientSession {
        layer,
        replica,
        me,
        state_tx,
        feedback,
        settle: config.join_settle_delay,
    };
    let task = tokio::spawn(session.run(inbox, commands_rx));

    Ok(ClientHandle {
        commands,
        state,
        player_id,
        task,
    })
}
