use clap::Parser;
use log::{error, info};

use client::channel::Channels;
use client::matchmaking::{
    MatchmakingKind, MatchmakingOutcome, MatchmakingSession, TournamentSession,
};
use client::network::ServerEndpoint;
use client::rendering::CourtRenderer;
use client::session::{GameMode, GameSession, SessionExit};
use client::storage::{RejoinStore, GAME_KEY};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game server hostname
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Game server port
    #[arg(short = 'p', long, default_value = "9443")]
    port: u16,

    /// Use plain ws:// instead of wss:// (local development servers)
    #[arg(long)]
    insecure: bool,

    /// Authenticated user id
    #[arg(short = 'u', long, default_value = "1")]
    user_id: u32,

    /// Play a local two-keyboard game
    #[arg(long)]
    local: bool,

    /// Join the remote game with this id
    #[arg(long)]
    game: Option<u64>,

    /// Queue for a pairing: "game" or "tournament"
    #[arg(long)]
    matchmaking: Option<String>,

    /// Watch this tournament bracket and join the next match
    #[arg(long)]
    tournament: Option<u64>,

    /// Render loop frame rate
    #[arg(long, default_value = "60")]
    fps: u32,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let scheme = if args.insecure { "ws" } else { "wss" };
    let endpoint = ServerEndpoint::new(scheme, &args.host, args.port);

    info!("Starting client...");
    info!("Game server: {}://{}:{}", scheme, args.host, args.port);
    info!("Controls: A/D to move, P/Q to pause/unpause");

    let channels = Channels::new();
    let store = RejoinStore::new();
    let mut display = CourtRenderer::new(args.width as f32, args.height as f32);

    let mut mode = resolve_mode(&args, &endpoint, &channels, &store).await?;

    // Rejoin loop: a non-terminal close leaves the game id persisted, so
    // the same match can be picked back up, the way a page reload would.
    let mut attempts = 0;
    loop {
        let mut session = GameSession::connect(
            &endpoint,
            mode.clone(),
            args.user_id,
            channels.clone(),
            store.clone(),
            args.fps,
        )
        .await?;

        let exit = session.run(&mut display).await;
        session.end();

        match exit {
            SessionExit::Finished => {
                info!("match finished");
                return Ok(());
            }
            SessionExit::NavigateBack => {
                error!("game connection failed, returning to menu");
                return Ok(());
            }
            SessionExit::ConnectionLost => {
                attempts += 1;
                match store.get(GAME_KEY) {
                    Some(id) if attempts < 3 => {
                        info!("connection lost, rejoining game {id}");
                        mode = GameMode::Remote {
                            game_id: id.parse()?,
                        };
                    }
                    _ => {
                        error!("connection lost for good");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Figures out which game to run, queueing or watching a bracket first if
/// the flags ask for it. This is the navigation the browser router did.
async fn resolve_mode(
    args: &Args,
    endpoint: &ServerEndpoint,
    channels: &Channels,
    store: &RejoinStore,
) -> Result<GameMode, Box<dyn std::error::Error>> {
    if args.local {
        return Ok(GameMode::Local);
    }

    if let Some(game_id) = args.game {
        return Ok(GameMode::Remote { game_id });
    }

    if let Some(kind) = &args.matchmaking {
        let kind = match kind.as_str() {
            "game" => MatchmakingKind::Game,
            "tournament" => MatchmakingKind::Tournament,
            other => return Err(format!("unknown matchmaking kind \"{other}\"").into()),
        };

        let session = MatchmakingSession::connect(endpoint, kind, channels.clone()).await?;
        return match session.wait().await {
            MatchmakingOutcome::GameFound { game_id } => {
                info!("game found: {game_id}");
                Ok(GameMode::Remote { game_id })
            }
            MatchmakingOutcome::TournamentFound { tournament_id } => {
                info!("tournament found: {tournament_id}");
                watch_tournament(endpoint, tournament_id, channels, store).await
            }
            MatchmakingOutcome::Disconnected => {
                Err("matchmaking ended without a pairing".into())
            }
        };
    }

    if let Some(tournament_id) = args.tournament {
        return watch_tournament(endpoint, tournament_id, channels, store).await;
    }

    Err("pick one of --local, --game, --matchmaking or --tournament".into())
}

async fn watch_tournament(
    endpoint: &ServerEndpoint,
    tournament_id: u64,
    channels: &Channels,
    store: &RejoinStore,
) -> Result<GameMode, Box<dyn std::error::Error>> {
    let session =
        TournamentSession::connect(endpoint, tournament_id, channels.clone(), store.clone())
            .await?;

    match session.wait().await {
        Some(game_id) => {
            info!("bracket match assigned: {game_id}");
            Ok(GameMode::Remote { game_id })
        }
        None => Err("tournament channel closed before a match was assigned".into()),
    }
}
