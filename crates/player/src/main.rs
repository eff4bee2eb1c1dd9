//! PlayTogether terminal client.
//!
//! ```text
//! playtogether local tic-tac-toe
//! playtogether local memory [4|9|16]
//! playtogether host <tic-tac-toe|memory-race> [name]
//! playtogether join <game-id> [name] [kind]
//! ```
//!
//! Positions are read from stdin, one per line; `q` quits.

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playtogether_domain::{Board, BoardSize, GameKind, RemoteGameId, Symbol};
use playtogether_player::{
    BoardRenderer, ClientConfig, GameOver, GuestNameGenerator, LocalSession, Navigator,
    SessionManager, SessionPorts,
};

const USAGE: &str = "usage: playtogether local tic-tac-toe | local memory [4|9|16] | \
                     host <kind> [name] | join <game-id> [name] [kind]";

enum Mode {
    LocalStrategy,
    LocalMemory(BoardSize),
    Host {
        kind: GameKind,
        name: Option<String>,
    },
    Join {
        game_id: RemoteGameId,
        name: Option<String>,
        kind: Option<GameKind>,
    },
}

fn parse_args(args: &[String]) -> anyhow::Result<Mode> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["local", kind, ..] if kind.contains("tic") => Ok(Mode::LocalStrategy),
        ["local", "memory"] => Ok(Mode::LocalMemory(BoardSize::Classic)),
        ["local", "memory", cells] => {
            let cells: usize = cells.parse().context("board size must be 4, 9 or 16")?;
            Ok(Mode::LocalMemory(BoardSize::from_len(cells)?))
        }
        ["host", kind, rest @ ..] => Ok(Mode::Host {
            kind: kind.parse()?,
            name: rest.first().map(|n| n.to_string()),
        }),
        ["join", game_id, rest @ ..] => Ok(Mode::Join {
            game_id: RemoteGameId::new(*game_id),
            name: rest.first().map(|n| n.to_string()),
            kind: rest.get(1).map(|k| k.parse()).transpose()?,
        }),
        _ => bail!(USAGE),
    }
}

struct TerminalRenderer;

impl BoardRenderer for TerminalRenderer {
    fn render(&self, board: &Board) {
        let side = board.size().side();
        let mut out = String::new();
        for row in board.cells().chunks(side) {
            let line: Vec<String> = row
                .iter()
                .map(|cell| match cell.value() {
                    Some(Symbol::Number(n)) if cell.is_revealed() => format!("{:>2}", n),
                    Some(Symbol::Number(_)) => format!("{:>2}", "#"),
                    Some(symbol) => format!("{:>2}", symbol),
                    None => format!("{:>2}", cell.position()),
                })
                .collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        println!("{}", out);
    }
}

struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate_home(&self) {
        println!("Connection to the game was lost. Back to the main menu.");
    }
}

fn announce(event: GameOver) {
    println!("Game over: {:?}", event.outcome);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playtogether_player=debug,playtogether_domain=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = parse_args(&args)?;

    match mode {
        Mode::LocalStrategy => {
            let local = LocalSession::new(Arc::new(TerminalRenderer));
            local.on_game_over(announce).await;
            local.start_strategy().await;
            read_positions(|position| {
                let local = local.clone();
                async move {
                    local.play(position).await;
                }
            })
            .await?;
        }
        Mode::LocalMemory(size) => {
            let local = LocalSession::new(Arc::new(TerminalRenderer));
            local.on_game_over(announce).await;
            local.start_memory(size).await;
            read_positions(|position| {
                let local = local.clone();
                async move {
                    local.reveal(position).await;
                }
            })
            .await?;
        }
        Mode::Host { kind, name } => {
            let manager = remote_manager().await;
            manager.create_or_join(None, name, Some(kind)).await?;
            run_remote(manager).await?;
        }
        Mode::Join {
            game_id,
            name,
            kind,
        } => {
            let manager = remote_manager().await;
            manager.create_or_join(Some(game_id), name, kind).await?;
            run_remote(manager).await?;
        }
    }
    Ok(())
}

async fn remote_manager() -> SessionManager {
    let config = ClientConfig::from_env();
    tracing::info!(
        api_url = %config.api_url,
        hub_url = %config.hub_url,
        transport = ?config.transport,
        "Starting PlayTogether client"
    );
    let manager = SessionManager::from_config(
        &config,
        SessionPorts {
            renderer: Arc::new(TerminalRenderer),
            navigator: Arc::new(TerminalNavigator),
            names: Arc::new(GuestNameGenerator),
        },
    );
    manager.on_game_over(announce).await;
    manager
}

async fn run_remote(manager: SessionManager) -> anyhow::Result<()> {
    let state = manager.diagnostics().await;
    if let Some(game_id) = &state.remote_game_id {
        println!("Playing game {} as {}", game_id, state.participant_name.unwrap_or_default());
    }

    let result = read_positions(|position| {
        let manager = manager.clone();
        async move {
            if let Err(e) = manager.submit_move(position).await {
                println!("Move not sent: {}", e);
            }
        }
    })
    .await;
    manager.leave().await;
    result
}

async fn read_positions<F, Fut>(mut on_position: F) -> anyhow::Result<()>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            break;
        }
        match line.parse::<usize>() {
            Ok(position) => on_position(position).await,
            Err(_) => println!("Enter a cell number, or q to quit"),
        }
    }
    Ok(())
}
