use anyhow::Context;
use dotenvy::dotenv;
use std::{fmt::Write as _, sync::Arc};
use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use outsider::{
    models::{
        cli::{Command, ConsoleCommand},
        game::{GamePhase, GameState},
        player::PlayerId,
        room::RoomCode,
    },
    network::{ws_client::WsClient, ws_host::WsHost},
    services::{
        feedback::{FeedbackSink, TracingFeedback},
        sync_service::{host_room, join_room, ClientHandle, HostHandle, SessionError},
        word_pack_registry::WordPackRegistry,
    },
    state::AppState,
    utils::{config::CONFIG, entropy::game_rng},
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("outsider=debug,tower_http=debug,axum=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

enum Seat {
    Host(HostHandle),
    Client(ClientHandle),
}

impl Seat {
    fn state(&self) -> GameState {
        match self {
            Seat::Host(h) => h.state(),
            Seat::Client(c) => c.state(),
        }
    }

    fn player_id(&self) -> &PlayerId {
        match self {
            Seat::Host(h) => h.player_id(),
            Seat::Client(c) => c.player_id(),
        }
    }

    fn player_at(&self, index: usize) -> Result<PlayerId, String> {
        self.state()
            .players
            .get(index)
            .map(|p| p.id.clone())
            .ok_or_else(|| format!("no player #{}", index + 1))
    }

    async fn run(&self, command: ConsoleCommand) -> Result<(), String> {
        let result = match (self, command) {
            (Seat::Host(h), ConsoleCommand::Start) => h.start_game().await,
            (Seat::Host(h), ConsoleCommand::Restart) => h.restart().await,
            (Seat::Client(_), ConsoleCommand::Start | ConsoleCommand::Restart) => {
                return Err("only the host can do that".to_string())
            }
            (Seat::Host(h), ConsoleCommand::Ready) => h.ready().await,
            (Seat::Client(c), ConsoleCommand::Ready) => c.ready().await,
            (Seat::Host(h), ConsoleCommand::Hint(text)) => h.end_turn(text).await,
            (Seat::Client(c), ConsoleCommand::Hint(text)) => c.end_turn(text).await,
            (seat, ConsoleCommand::Vote { accused, teammate }) => {
                let accused = seat.player_at(accused)?;
                let teammate = teammate.map(|i| seat.player_at(i)).transpose()?;
                match seat {
                    Seat::Host(h) => h.vote(accused, teammate).await,
                    Seat::Client(c) => c.vote(accused, teammate).await,
                }
            }
            (Seat::Host(h), ConsoleCommand::Settings(config)) => h.update_settings(config).await,
            (Seat::Client(c), ConsoleCommand::Settings(config)) => c.update_settings(config).await,
            (seat, ConsoleCommand::State) => {
                println!("{}", render(&seat.state(), seat.player_id()));
                Ok(())
            }
            (_, ConsoleCommand::Leave) => Ok(()),
        };
        result.map_err(|e: SessionError| e.to_string())
    }

    async fn leave(self) {
        match self {
            Seat::Host(h) => h.leave().await,
            Seat::Client(c) => c.leave().await,
        }
    }
}

fn render(state: &GameState, me: &PlayerId) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "room {} | {:?} | round {}/{} | timer {}",
        state.room_code, state.phase, state.current_round, state.config.max_rounds, state.timer
    );
    for (i, p) in state.players.iter().enumerate() {
        let turn = state.current_turn_player_id.as_ref() == Some(&p.id);
        let _ = writeln!(
            out,
            "  #{} {}{}{} score {}{}",
            i + 1,
            p.name,
            if p.is_host { " (host)" } else { "" },
            if &p.id == me { " (you)" } else { "" },
            p.score,
            if turn { "  <- speaking" } else { "" },
        );
    }
    if let Some(me) = state.player(me) {
        if let Some(word) = &me.word {
            let _ = writeln!(out, "your word: {} ({})", word, me.special_role);
        }
    }
    for hint in state.hints_for_round(state.current_round) {
        let name = state.player(&hint.player_id).map(|p| p.name.as_str()).unwrap_or("?");
        let _ = writeln!(out, "  {}: {}", name, hint.text);
    }
    if state.phase == GamePhase::Results {
        if let Some(tally) = &state.tally {
            let outsider = tally
                .outsider_id
                .as_ref()
                .and_then(|id| state.player(id))
                .map(|p| p.name.as_str())
                .unwrap_or("?");
            let _ = writeln!(
                out,
                "outsider {} was {}",
                outsider,
                if tally.outsider_caught { "caught" } else { "not caught" }
            );
        }
    }
    out
}

async fn run_console(seat: Seat) -> anyhow::Result<()> {
    let mut updates = match &seat {
        Seat::Host(h) => h.subscribe(),
        Seat::Client(c) => c.subscribe(),
    };
    let me = seat.player_id().clone();
    let printer = tokio::spawn(async move {
        let mut last_phase = None;
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            if last_phase != Some(state.phase) {
                last_phase = Some(state.phase);
                println!("{}", render(&state, &me));
            }
            if state.phase == GamePhase::Home {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        if command == ConsoleCommand::Leave {
            break;
        }
        if let Err(e) = seat.run(command).await {
            eprintln!("{}", e);
        }
        if seat.state().phase == GamePhase::Home {
            break;
        }
    }

    seat.leave().await;
    printer.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenv() {
        eprintln!("Warning: failed to load .env: {}", e);
    }
    init_tracing();

    let command = Command::from_args();
    let config = CONFIG.clone();
    let registry = Arc::new(match &config.word_packs_path {
        Some(path) => WordPackRegistry::from_file(path)
            .with_context(|| format!("loading word packs from {}", path.display()))?,
        None => WordPackRegistry::builtin(),
    });
    let feedback: Arc<dyn FeedbackSink> = Arc::new(TracingFeedback);

    let seat = match command {
        Command::Host { name, avatar } => {
            let state = AppState::new();
            let layer = WsHost::bind(state.clone(), config.bind_addr).await?;
            let addr = layer.local_addr().unwrap_or(config.bind_addr);
            let handle = host_room(
                layer,
                &name,
                &avatar,
                &config,
                registry,
                game_rng(config.seed),
                feedback,
            )
            .await?;
            state
                .track_session(handle.room_code().clone(), handle.subscribe())
                .await;
            println!("Room {} is open on ws://{}", handle.room_code(), addr);
            Seat::Host(handle)
        }
        Command::Join {
            addr,
            room,
            name,
            avatar,
        } => {
            let layer = WsClient::new(addr, config.connect_timeout);
            let handle = join_room(layer, &RoomCode(room), &name, &avatar, &config, feedback).await?;
            Seat::Client(handle)
        }
    };

    run_console(seat).await
}
