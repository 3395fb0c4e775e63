use structopt::StructOpt;

use super::config::GameConfig;

#[derive(Debug, StructOpt)]
#[structopt(name = "outsider", about = "usage of outsider commands.")]
pub enum Command {
    /// open a room and host the game
    #[structopt(name = "host")]
    Host {
        /// display name
        #[structopt(long)]
        name: String,
        #[structopt(long, default_value = "")]
        avatar: String,
    },
    /// join a room hosted elsewhere
    #[structopt(name = "join")]
    Join {
        /// host origin, e.g. ws://127.0.0.1:8080
        #[structopt(long)]
        addr: String,
        /// four digit room code
        #[structopt(long)]
        room: String,
        #[structopt(long)]
        name: String,
        #[structopt(long, default_value = "")]
        avatar: String,
    },
}

/// One line typed at the console. Player references are 1-based positions
/// in the room's player list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Ready,
    Hint(String),
    Vote {
        accused: usize,
        teammate: Option<usize>,
    },
    Settings(GameConfig),
    Restart,
    State,
    Leave,
}

fn position(arg: Option<&str>, what: &str) -> Result<usize, String> {
    let arg = arg.ok_or_else(|| format!("missing {}", what))?;
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("{} must be a player number, got {:?}", what, arg)),
    }
}

impl std::str::FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let mut args = rest.split_whitespace();

        match word {
            "start" => Ok(ConsoleCommand::Start),
            "ready" => Ok(ConsoleCommand::Ready),
            "hint" => Ok(ConsoleCommand::Hint(rest.trim().to_string())),
            "vote" => {
                let accused = position(args.next(), "accused")?;
                let teammate = match args.next() {
                    None | Some("none") => None,
                    some => Some(position(some, "teammate")?),
                };
                Ok(ConsoleCommand::Vote { accused, teammate })
            }
            "settings" => {
                let max_rounds = args
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or("usage: settings <rounds> <seconds> <on|off>")?;
                let round_duration_base = args
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or("usage: settings <rounds> <seconds> <on|off>")?;
                let include_special_roles = matches!(args.next(), Some("on"));
                Ok(ConsoleCommand::Settings(GameConfig {
                    max_rounds,
                    round_duration_base,
                    include_special_roles,
                }))
            }
            "restart" => Ok(ConsoleCommand::Restart),
            "state" | "" => Ok(ConsoleCommand::State),
            "leave" | "quit" => Ok(ConsoleCommand::Leave),
            other => Err(format!("unknown command {:?}", other)),
        }
    }
}
