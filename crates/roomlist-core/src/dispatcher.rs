use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::types::{Action, ClientEvent};

/// Broadcast stream handed to subscribers.
pub type EventStream = broadcast::Receiver<ClientEvent>;

/// Errors returned by dispatcher operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The consumer loop has stopped.
    #[error("action queue is closed")]
    QueueClosed,
    /// The queue is full and the action was not enqueued.
    #[error("action queue is full")]
    QueueFull,
}

/// Action queue plus event fan-out shared by producers, the consumer loop and
/// subscribers.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    action_tx: mpsc::Sender<Action>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl Dispatcher {
    /// Create a dispatcher and return it with the single action receiver.
    pub fn new(action_buffer: usize, event_buffer: usize) -> (Self, mpsc::Receiver<Action>) {
        let (action_tx, action_rx) = mpsc::channel(action_buffer.max(1));
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));

        (
            Self {
                action_tx,
                event_tx,
            },
            action_rx,
        )
    }

    pub fn action_sender(&self) -> mpsc::Sender<Action> {
        self.action_tx.clone()
    }

    pub fn subscribe(&self) -> EventStream {
        self.event_tx.subscribe()
    }

    /// Queue an action, waiting for room if the queue is full.
    pub async fn dispatch(&self, action: Action) -> Result<(), DispatchError> {
        self.action_tx
            .send(action)
            .await
            .map_err(|_| DispatchError::QueueClosed)
    }

    /// Queue an action without waiting.
    pub fn try_dispatch(&self, action: Action) -> Result<(), DispatchError> {
        self.action_tx.try_send(action).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DispatchError::QueueClosed,
        })
    }

    /// Emit an event to all current subscribers.
    ///
    /// Best-effort; with no subscribers the event is dropped.
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event);
    }
}
