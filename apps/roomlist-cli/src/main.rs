mod config;
mod fixture;
mod logging;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use config::CliConfig;
use fixture::RoomFixture;
use roomlist_core::{
    Action, ClientEvent, EventStream, Permalinks, RoomDirectory, RoomId, RoomSource, SyncState,
    UserId, permalinks::RoomPermalinkCreator,
};
use roomlist_platform::{InMemoryUiStateStore, JsonFileUiStateStore, UiStateStore};
use roomlist_runtime::spawn_runtime;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

const ANONYMOUS_USER_ID: &str = "@roomlist:localhost";

#[derive(Debug, Parser)]
#[command(name = "roomlist", version, about = "Room list snapshots and permalink tools")]
struct Cli {
    /// JSON room fixture standing in for a synced account.
    #[arg(long, short, global = true)]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the room lists after the initial sync.
    Lists {
        /// Open this room after the lists are built.
        #[arg(long)]
        view: Option<String>,
        /// File with one JSON action per line, applied after the initial sync.
        #[arg(long)]
        actions: Option<PathBuf>,
    },
    /// Print the via servers chosen for a room.
    Via { room_id: String },
    /// Build a permalink for a room, alias, user or group.
    Permalink {
        entity: String,
        /// Link to this event in the room instead of the room itself.
        #[arg(long)]
        event: Option<String>,
    },
    /// Parse a permalink into its parts.
    Parse { url: String },
    /// Rewrite a permalink or app URL into an app-local href.
    LocalHref { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = CliConfig::from_env()?;
    debug!(?config, "loaded configuration");

    let directory = load_directory(cli.fixture.as_deref(), config.timeline_max_events)?;
    let permalinks = Permalinks::new(config.permalink_config())?;

    match cli.command {
        Command::Lists { view, actions } => run_lists(&config, directory, view, actions).await,
        Command::Via { room_id } => {
            let room_id = RoomId::parse(room_id)?;
            if directory.room(&room_id).is_none() {
                bail!("room {room_id} is not in the fixture");
            }
            print_json(&permalinks.calculate_room_via(&directory, &room_id))
        }
        Command::Permalink { entity, event } => {
            let link = match event {
                Some(event_id) => event_permalink(&permalinks, &directory, &entity, &event_id)?,
                None => permalinks
                    .try_transform_entity_to_permalink(&directory, &entity)
                    .with_context(|| format!("cannot build a permalink for '{entity}'"))?,
            };
            println!("{link}");
            Ok(())
        }
        Command::Parse { url } => print_json(&permalinks.parse_permalink(&url)?),
        Command::LocalHref { url } => {
            println!("{}", permalinks.try_transform_permalink_to_local_href(&url));
            Ok(())
        }
    }
}

fn load_directory(fixture: Option<&Path>, timeline_max_events: usize) -> Result<RoomDirectory> {
    match fixture {
        Some(path) => {
            let directory = RoomFixture::load(path)?.into_directory(timeline_max_events);
            info!(rooms = directory.len(), path = %path.display(), "loaded room fixture");
            Ok(directory)
        }
        None => Ok(RoomDirectory::new(UserId::parse(ANONYMOUS_USER_ID)?)
            .with_max_timeline_events(timeline_max_events)),
    }
}

fn event_permalink(
    permalinks: &Permalinks,
    directory: &RoomDirectory,
    room_id: &str,
    event_id: &str,
) -> Result<String> {
    let room_id = RoomId::parse(room_id)?;
    let creator = match directory.room(&room_id) {
        Some(room) => RoomPermalinkCreator::load(room),
        None => RoomPermalinkCreator::for_unknown_room(room_id),
    };
    Ok(creator.for_event(permalinks, event_id))
}

async fn run_lists(
    config: &CliConfig,
    directory: RoomDirectory,
    view: Option<String>,
    actions: Option<PathBuf>,
) -> Result<()> {
    let ui_state: Arc<dyn UiStateStore> = match &config.state_file {
        Some(path) => Arc::new(JsonFileUiStateStore::open(path)?),
        None => Arc::new(InMemoryUiStateStore::default()),
    };
    let handle = spawn_runtime(config.runtime_config(), directory, ui_state);
    let mut events = handle.subscribe();

    handle
        .send(Action::Sync {
            prev_state: None,
            state: SyncState::Prepared,
        })
        .await?;

    if let Some(path) = actions {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read actions {}", path.display()))?;
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if let Err(err) = handle.send_json(line).await {
                warn!(line = index + 1, error = %err, "skipping action");
            }
        }
    }

    if let Some(room_id) = view {
        handle
            .send(Action::ViewRoom {
                room_id: RoomId::parse(room_id)?,
            })
            .await?;
    }

    let state = handle.shutdown().await?;
    report_dialogs(&mut events);

    let diagnostics = state.store.diagnostics();
    if diagnostics.fallback_insertions > 0 || diagnostics.duplicate_insertions > 0 {
        warn!(?diagnostics, "room lists needed repair while slotting");
    }
    print_json(&state.snapshot())
}

fn report_dialogs(events: &mut EventStream) {
    loop {
        match events.try_recv() {
            Ok(ClientEvent::ErrorDialog {
                title,
                message,
                code,
            }) => warn!(%code, %title, %message, "error dialog"),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
