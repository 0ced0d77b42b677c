use serde::{Deserialize, Serialize};

use crate::{error::ClientError, types::SyncState};

/// Readiness of the room list store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreLifecycle {
    /// No prepared sync seen yet.
    #[default]
    Cold,
    /// Lists are built and accept incremental updates.
    Ready,
    /// The session ended; waiting for the next prepared sync.
    LoggedOut,
}

/// Gate deciding which actions the store may react to.
#[derive(Debug, Clone, Default)]
pub struct LifecycleGate {
    state: StoreLifecycle,
}

impl LifecycleGate {
    pub fn state(&self) -> StoreLifecycle {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == StoreLifecycle::Ready
    }

    /// Feed a sync transition.
    ///
    /// Returns `true` when the sync just became prepared, which is the signal to
    /// rebuild every list from scratch.
    pub fn on_sync(&mut self, prev_state: Option<SyncState>, state: SyncState) -> bool {
        let became_prepared =
            prev_state != Some(SyncState::Prepared) && state == SyncState::Prepared;
        if became_prepared {
            self.state = StoreLifecycle::Ready;
        }
        became_prepared
    }

    /// Lists were generated outside a sync transition.
    pub fn mark_ready(&mut self) {
        self.state = StoreLifecycle::Ready;
    }

    pub fn on_logged_out(&mut self) {
        self.state = StoreLifecycle::LoggedOut;
    }

    /// Reject `action` unless the store is ready.
    pub fn require_ready(&self, action: &str) -> Result<(), ClientError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ClientError::invalid_state(self.state, action))
        }
    }
}
