mod commands;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use commands::Command;
use swipify_common::Decision;
use swipify_core::remote::memory::InMemoryRemote;
use swipify_core::remote::spotify::SpotifyRemote;
use swipify_core::session::{format_eta, UndoOutcome};
use swipify_core::{
    export, snapshot, LibraryRemote, RetryMode, SessionError, SessionState, SwipeEngine,
    SwipifyConfig, Track, TrackFilter,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// swipify: triage your liked songs one at a time.
#[derive(Parser)]
#[command(name = "swipify")]
struct Args {
    /// OAuth bearer token for the Web API.
    #[arg(long, env = "SWIPIFY_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Run against an in-memory library of this many generated tracks
    /// instead of the Web API.
    #[arg(long)]
    demo: Option<usize>,

    /// Where the session snapshot lives.
    #[arg(long, env = "SWIPIFY_STATE_PATH")]
    state_path: Option<PathBuf>,

    /// Name of the collection `p` files into.
    #[arg(long, env = "SWIPIFY_PRIMARY_COLLECTION")]
    primary_collection: Option<String>,

    /// Name of the collection `f` files into.
    #[arg(long, env = "SWIPIFY_SECONDARY_COLLECTION")]
    secondary_collection: Option<String>,

    /// How many decisions `u` can walk back.
    #[arg(long, env = "SWIPIFY_UNDO_DEPTH")]
    undo_depth: Option<usize>,

    /// `strict` or `permissive`.
    #[arg(long, env = "SWIPIFY_RETRY_MODE")]
    retry_mode: Option<RetryMode>,
}

impl Args {
    fn apply_to(&self, config: &mut SwipifyConfig) {
        if let Some(path) = &self.state_path {
            config.state_path = path.clone();
        }
        if let Some(name) = &self.primary_collection {
            config.primary_collection_name = name.clone();
        }
        if let Some(name) = &self.secondary_collection {
            config.secondary_collection_name = name.clone();
        }
        if let Some(depth) = self.undo_depth {
            config.undo_depth = depth;
        }
        if let Some(mode) = self.retry_mode {
            config.retry_mode = mode;
        }
    }
}

fn configure_logging() {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_line_number(true)
        .with_target(false)
        .with_file(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() {
    configure_logging();
    info!("swipify starting");

    // Loads .env in dev mode, so it has to run before clap reads env vars
    let mut config = SwipifyConfig::load();
    let args = Args::parse();
    args.apply_to(&mut config);

    let state = snapshot::restore_session(&config);

    if let Some(size) = args.demo {
        info!("Demo mode with {size} generated tracks");
        let remote = InMemoryRemote::with_liked((1..=size).map(|i| format!("demo{i}")));
        let engine = SwipeEngine::from_config(remote, &config);
        run(engine, state, &mut config).await;
        return;
    }

    let Some(token) = args.access_token.clone().filter(|t| !t.is_empty()) else {
        error!("--access-token (or SWIPIFY_ACCESS_TOKEN) is required unless --demo is given");
        std::process::exit(1);
    };
    let remote = SpotifyRemote::with_base_url(config.api_base_url.clone(), token);
    let engine = SwipeEngine::from_config(remote, &config);
    run(engine, state, &mut config).await;
}

async fn run<R: LibraryRemote>(
    mut engine: SwipeEngine<R>,
    mut state: SessionState,
    config: &mut SwipifyConfig,
) {
    if state.queue.is_empty() {
        println!("Queue is empty. Type 'build' to load your liked songs, 'help' for commands.");
    } else {
        show_head(&mut engine, &mut state).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {e}");
                break;
            }
        };
        let command = match commands::parse(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        if execute(&mut engine, &mut state, config, command).await {
            save(&config.state_path, &state);
        }
    }

    save(&config.state_path, &state);
    info!("swipify exiting");
}

/// Run one command. Returns whether the session state may have changed.
async fn execute<R: LibraryRemote>(
    engine: &mut SwipeEngine<R>,
    state: &mut SessionState,
    config: &mut SwipifyConfig,
    command: Command,
) -> bool {
    match command {
        Command::Build { filter, shuffle } => {
            build(engine, state, &filter, shuffle).await;
            true
        }
        Command::Artist => {
            let head = match engine.current_head(state).await {
                Ok(head) => head,
                Err(e) => {
                    report_head_error(&e);
                    return !e.dropped().is_empty();
                }
            };
            report_dropped(&head.dropped);
            let Some(track) = head.track else {
                println!("Queue is empty.");
                return true;
            };
            let artist = track.artist_line();
            println!("Artist blitz: {artist}");
            let built = engine.build_queue_for_contributor(state, &artist).await;
            report_build(engine, state, built).await;
            true
        }
        Command::Decide(decision) => {
            match engine.apply_decision(state, decision).await {
                Ok(applied) => println!("{} {}", verb(applied.decision), applied.item_id),
                Err(e) => println!("Nothing changed: {e}"),
            }
            show_head(engine, state).await;
            true
        }
        Command::Undo => {
            match engine.undo(state).await {
                Ok(UndoOutcome::NothingToUndo) => println!("Nothing to undo."),
                Ok(UndoOutcome::Restored {
                    item_id,
                    decision,
                    reversal_error,
                }) => {
                    println!("Undid {decision} of {item_id}");
                    if let Some(e) = reversal_error {
                        println!("  (the remote change could not be reversed: {e})");
                    }
                }
                Err(e) => println!("Undo failed: {e}"),
            }
            show_head(engine, state).await;
            true
        }
        Command::Stats => {
            let stats = engine.stats(state);
            println!(
                "{} processed, {} remaining of {} ({:.0}%), {} today",
                stats.processed,
                stats.remaining,
                stats.total,
                stats.fraction_done() * 100.0,
                stats.swiped_today
            );
            if let Some(eta) = stats.eta {
                println!("ETA {}", format_eta(eta));
            }
            false
        }
        Command::Size => {
            match engine.estimate_library_size().await {
                Ok(size) => println!("{size} liked songs"),
                Err(e) => println!("Could not size the library: {e}"),
            }
            false
        }
        Command::Export(path) => {
            match export::write_decisions_csv(&path, &state.ledger) {
                Ok(rows) => println!("Wrote {rows} decision(s) to {}", path.display()),
                Err(e) => println!("Export failed: {e}"),
            }
            false
        }
        Command::Rename { role, name } => {
            engine.set_collection_name(state, role, &name);
            config.set_collection_name(role, &name);
            if let Err(e) = config.save() {
                warn!("Failed to save collection name: {e}");
                println!("Renamed for this session only, the config could not be saved: {e}");
            }
            println!("{role:?} collection: {name}");
            true
        }
        Command::Reset => match snapshot::reset_session(config) {
            Ok(fresh) => {
                *state = fresh;
                println!("Session cleared. Type 'build' to start over.");
                false
            }
            Err(e) => {
                println!("Reset failed: {e}");
                false
            }
        },
        Command::WhoAmI => {
            match engine.current_user().await {
                Ok(user) => println!("Signed in as {user}"),
                Err(e) => println!("Could not look up the account: {e}"),
            }
            false
        }
        Command::Help => {
            println!("{}", commands::HELP);
            false
        }
        Command::Quit => false,
    }
}

async fn build<R: LibraryRemote>(
    engine: &mut SwipeEngine<R>,
    state: &mut SessionState,
    filter: &TrackFilter,
    shuffle: bool,
) {
    let built = engine.build_queue(state, filter, shuffle).await;
    report_build(engine, state, built).await;
}

async fn report_build<R: LibraryRemote>(
    engine: &mut SwipeEngine<R>,
    state: &mut SessionState,
    built: Result<usize, SessionError>,
) {
    match built {
        Ok(len) => {
            println!("{len} track(s) queued");
            show_head(engine, state).await;
        }
        Err(e) => println!("Build failed: {e}"),
    }
}

async fn show_head<R: LibraryRemote>(engine: &mut SwipeEngine<R>, state: &mut SessionState) {
    match engine.current_head(state).await {
        Ok(head) => {
            report_dropped(&head.dropped);
            match &head.track {
                Some(track) => print_track(track),
                None => println!("Queue is empty. Type 'build' to start over."),
            }
        }
        Err(e) => {
            warn!("Could not load head of queue: {e}");
            report_head_error(&e);
        }
    }
}

fn report_dropped(ids: &[String]) {
    for id in ids {
        println!("Skipped unavailable track {id}");
    }
}

fn report_head_error(e: &SessionError) {
    report_dropped(e.dropped());
    println!("Could not load the current track: {e}");
}

fn print_track(track: &Track) {
    println!();
    println!("  {}", track.title);
    println!("  {}", track.artist_line());
    match track.release_year() {
        Some(year) => println!("  {} ({year})", track.album),
        None => println!("  {}", track.album),
    }
    println!("  {}", track.duration_display());
    if let Some(url) = &track.external_url {
        println!("  {url}");
    }
    println!("  [k]eep [r]emove [p]rimary [f]avourite [s]kip [u]ndo");
}

fn verb(decision: Decision) -> &'static str {
    match decision {
        Decision::Keep => "Kept",
        Decision::Remove => "Removed",
        Decision::FilePrimary => "Filed (primary)",
        Decision::FileSecondary => "Filed (secondary)",
        Decision::Skip => "Skipped",
    }
}

fn save(path: &Path, state: &SessionState) {
    if let Err(e) = snapshot::save_state(path, state) {
        error!("Failed to save session to {}: {e}", path.display());
    }
}
