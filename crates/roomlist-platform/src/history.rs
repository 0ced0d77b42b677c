//! Per-room history of sent messages for up/down recall in the composer.

use tracing::warn;

use crate::{UiStateError, UiStateStore, drafts::ComposerDraft};

pub const MAX_HISTORY_ITEMS: usize = 100;

fn history_key(room_id: &str) -> String {
    format!("history:{room_id}")
}

/// Sent-message history of one room plus a navigation cursor.
///
/// Items keep the reply target next to the text, so recalling a reply
/// restores both. The cursor sits at `items.len()` while the user is
/// composing. Stepping up from there stashes the in-progress draft so that
/// stepping back past the newest item restores it.
pub struct SendHistory<S: UiStateStore> {
    store: S,
    room_id: String,
    items: Vec<ComposerDraft>,
    cursor: usize,
    stashed: Option<ComposerDraft>,
}

impl<S: UiStateStore> SendHistory<S> {
    pub fn load(store: S, room_id: impl Into<String>) -> Result<Self, UiStateError> {
        let room_id = room_id.into();
        let items: Vec<ComposerDraft> = match store.get_item(&history_key(&room_id))? {
            None => Vec::new(),
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(room_id = %room_id, error = %err, "ignoring malformed composer history");
                Vec::new()
            }),
        };
        let cursor = items.len();
        Ok(Self {
            store,
            room_id,
            items,
            cursor,
            stashed: None,
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn items(&self) -> &[ComposerDraft] {
        &self.items
    }

    /// Record a sent message and return to composing mode.
    pub fn save(&mut self, item: impl Into<ComposerDraft>) -> Result<(), UiStateError> {
        self.items.push(item.into());
        if self.items.len() > MAX_HISTORY_ITEMS {
            let excess = self.items.len() - MAX_HISTORY_ITEMS;
            self.items.drain(..excess);
        }
        self.cursor = self.items.len();
        self.stashed = None;

        let encoded = serde_json::to_string(&self.items)
            .map_err(|err| UiStateError::Encoding(err.to_string()))?;
        self.store.set_item(&history_key(&self.room_id), &encoded)
    }

    /// Step to an older (`up`) or newer entry.
    ///
    /// `composing` is the current composer state, stashed when leaving
    /// composing mode. Returns `None` when there is nowhere to go.
    pub fn select(&mut self, up: bool, composing: &ComposerDraft) -> Option<ComposerDraft> {
        if up {
            if self.cursor == 0 {
                return None;
            }
            if self.cursor == self.items.len() {
                self.stashed = Some(composing.clone());
            }
            self.cursor -= 1;
            return self.items.get(self.cursor).cloned();
        }

        if self.cursor >= self.items.len() {
            return None;
        }
        self.cursor += 1;
        match self.items.get(self.cursor) {
            Some(item) => Some(item.clone()),
            None => Some(self.stashed.take().unwrap_or_default()),
        }
    }
}
