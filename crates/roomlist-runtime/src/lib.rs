use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use roomlist_core::{
    Action, ClientError, ClientErrorCategory, ClientEvent, DispatchError, Dispatcher, EventId,
    EventStream, RoomDirectory, RoomId, RoomListSnapshot, RoomListStore, RoomSource,
    SortAlgorithm, normalize_error_dialog, normalize_sdk_failure,
};
use roomlist_platform::{DraftStore, UiStateError, UiStateStore};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_ACTION_BUFFER: usize = 128;
pub const DEFAULT_EVENT_BUFFER: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub action_buffer: usize,
    pub event_buffer: usize,
    pub algorithm: SortAlgorithm,
    pub tags_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            action_buffer: DEFAULT_ACTION_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
            algorithm: SortAlgorithm::Importance,
            tags_enabled: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("invalid action payload: {0}")]
    InvalidAction(String),
    #[error("runtime task failed: {0}")]
    TaskFailed(String),
}

/// State owned by the consumer loop, handed back on shutdown.
#[derive(Debug)]
pub struct RuntimeState {
    pub directory: RoomDirectory,
    pub store: RoomListStore,
}

impl RuntimeState {
    pub fn snapshot(&self) -> RoomListSnapshot {
        self.store.snapshot()
    }
}

#[derive(Debug)]
pub struct RoomListRuntimeHandle {
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
    task: JoinHandle<RuntimeState>,
}

impl RoomListRuntimeHandle {
    /// Producer side of the action queue, for callers that outlive the handle.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub async fn send(&self, action: Action) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(action).await
    }

    /// Decode and queue a JSON action. Undecodable payloads are reported to
    /// subscribers as an error dialog as well as returned.
    pub async fn send_json(&self, raw: &str) -> Result<(), RuntimeError> {
        let action: Action = match serde_json::from_str(raw) {
            Ok(action) => action,
            Err(err) => {
                let error = ClientError::new(
                    ClientErrorCategory::Serialization,
                    "invalid_action",
                    err.to_string(),
                );
                self.dispatcher.emit(normalize_error_dialog(error));
                return Err(RuntimeError::InvalidAction(err.to_string()));
            }
        };
        self.dispatcher.dispatch(action).await?;
        Ok(())
    }

    pub fn subscribe(&self) -> EventStream {
        self.dispatcher.subscribe()
    }

    /// Stop the consumer loop once the queued actions are drained and return
    /// its state.
    pub async fn shutdown(self) -> Result<RuntimeState, RuntimeError> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|err| RuntimeError::TaskFailed(err.to_string()))
    }
}

/// Start the single consumer loop on the current tokio runtime.
///
/// `directory` is the SDK-side room state the store reads from. Drafts and
/// reply targets are persisted through `ui_state`.
pub fn spawn_runtime(
    config: RuntimeConfig,
    directory: RoomDirectory,
    ui_state: Arc<dyn UiStateStore>,
) -> RoomListRuntimeHandle {
    let (dispatcher, action_rx) = Dispatcher::new(config.action_buffer, config.event_buffer);
    let shutdown = CancellationToken::new();
    let runtime = RoomListRuntime {
        dispatcher: dispatcher.clone(),
        action_rx,
        directory,
        store: RoomListStore::new(config.algorithm, config.tags_enabled),
        drafts: DraftStore::new(ui_state),
    };
    let stop = shutdown.child_token();
    let task = tokio::spawn(async move { runtime.run(stop).await });

    RoomListRuntimeHandle {
        dispatcher,
        shutdown,
        task,
    }
}

struct RoomListRuntime {
    dispatcher: Dispatcher,
    action_rx: mpsc::Receiver<Action>,
    directory: RoomDirectory,
    store: RoomListStore,
    drafts: DraftStore<Arc<dyn UiStateStore>>,
}

impl RoomListRuntime {
    async fn run(mut self, stop: CancellationToken) -> RuntimeState {
        loop {
            tokio::select! {
                biased;
                action = self.action_rx.recv() => {
                    let Some(action) = action else {
                        break;
                    };
                    self.handle_action(action);
                }
                _ = stop.cancelled() => break,
            }
        }
        debug!("room list runtime stopped");

        RuntimeState {
            directory: self.directory,
            store: self.store,
        }
    }

    fn handle_action(&mut self, action: Action) {
        debug!(action = %action.name(), room_id = ?action.room_id(), "handling action");
        match action {
            Action::ReplyToEvent { room_id, event_id } => self.handle_reply(room_id, event_id),
            Action::Effect { name } => self.dispatcher.emit(ClientEvent::Effect { name }),
            Action::SdkRequestFailed {
                operation,
                status,
                message,
            } => {
                let error = normalize_sdk_failure(&operation, status, message);
                warn!(code = %error.code, message = %error.message, "sdk request failed");
                self.dispatcher.emit(normalize_error_dialog(error));
            }
            other => self.apply_to_store(&other),
        }
    }

    fn apply_to_store(&mut self, action: &Action) {
        let was_ready = self.store.is_ready();
        self.directory.apply(action);
        let changed = self.store.on_action(&self.directory, action);

        if !was_ready && self.store.is_ready() {
            info!(rooms = self.directory.len(), "room list store ready");
            self.cleanup_drafts();
        }

        // A logout clears the lists without a rebuild; subscribers still need
        // the empty snapshot.
        if changed || matches!(action, Action::LoggedOut) {
            self.dispatcher.emit(ClientEvent::RoomListsUpdated {
                snapshot: self.store.snapshot(),
            });
        }
    }

    fn handle_reply(&mut self, room_id: RoomId, event_id: Option<EventId>) {
        if self.directory.room(&room_id).is_none() {
            self.dispatcher
                .emit(normalize_error_dialog(ClientError::room_not_found(&room_id)));
            return;
        }

        let reply = event_id.as_ref().map(|id| id.as_str().to_owned());
        if let Err(err) = self.drafts.set_reply(room_id.as_str(), reply) {
            self.dispatcher
                .emit(normalize_error_dialog(storage_error("save_draft", &err)));
        }
        self.dispatcher
            .emit(ClientEvent::ReplyChanged { room_id, event_id });
    }

    fn cleanup_drafts(&self) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        let directory = &self.directory;
        let is_known = |room: &str| {
            RoomId::parse(room)
                .ok()
                .is_some_and(|id| directory.room(&id).is_some())
        };
        match self.drafts.cleanup(is_known, now_ms) {
            Ok(removed) if removed > 0 => debug!(removed, "dropped drafts of unknown rooms"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "composer draft cleanup failed"),
        }
    }
}

fn storage_error(operation: &str, err: &UiStateError) -> ClientError {
    ClientError::new(
        ClientErrorCategory::Storage,
        "ui_state_write_failed",
        format!("{operation}: {err}"),
    )
}
