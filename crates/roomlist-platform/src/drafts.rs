//! Per-room composer drafts, including the event being replied to.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{UiStateError, UiStateStore};

const DRAFT_KEY_PREFIX: &str = "draft:";
const LAST_CLEANUP_KEY: &str = "drafts:last_cleanup";

/// Minimum gap between two cleanup sweeps.
pub const DRAFT_CLEANUP_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerDraft {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_event_id: Option<String>,
}

impl ComposerDraft {
    /// A draft worth persisting carries text or a reply target.
    pub fn is_worth_saving(&self) -> bool {
        !self.text.is_empty() || self.reply_event_id.is_some()
    }
}

impl From<&str> for ComposerDraft {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            reply_event_id: None,
        }
    }
}

impl From<String> for ComposerDraft {
    fn from(text: String) -> Self {
        Self {
            text,
            reply_event_id: None,
        }
    }
}

fn draft_key(room_id: &str) -> String {
    format!("{DRAFT_KEY_PREFIX}{room_id}")
}

pub struct DraftStore<S: UiStateStore> {
    store: S,
}

impl<S: UiStateStore> DraftStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored draft for `room_id`. Undecodable entries read as absent.
    pub fn load(&self, room_id: &str) -> Result<Option<ComposerDraft>, UiStateError> {
        let Some(raw) = self.store.get_item(&draft_key(room_id))? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(draft) => Ok(Some(draft)),
            Err(err) => {
                warn!(room_id, error = %err, "ignoring malformed composer draft");
                Ok(None)
            }
        }
    }

    /// Persist `draft`, or drop the entry when there is nothing to keep.
    pub fn save(&self, room_id: &str, draft: &ComposerDraft) -> Result<(), UiStateError> {
        let key = draft_key(room_id);
        if !draft.is_worth_saving() {
            return self.store.remove_item(&key);
        }
        let encoded =
            serde_json::to_string(draft).map_err(|err| UiStateError::Encoding(err.to_string()))?;
        self.store.set_item(&key, &encoded)
    }

    /// Replace the reply target of the room's draft, keeping its text.
    pub fn set_reply(
        &self,
        room_id: &str,
        reply_event_id: Option<String>,
    ) -> Result<ComposerDraft, UiStateError> {
        let mut draft = self.load(room_id)?.unwrap_or_default();
        draft.reply_event_id = reply_event_id;
        self.save(room_id, &draft)?;
        Ok(draft)
    }

    pub fn clear(&self, room_id: &str) -> Result<(), UiStateError> {
        self.store.remove_item(&draft_key(room_id))
    }

    /// Drop drafts of rooms `is_known` rejects.
    ///
    /// Sweeps at most once per [`DRAFT_CLEANUP_INTERVAL_MS`]; returns how many
    /// drafts were removed.
    pub fn cleanup<F>(&self, is_known: F, now_ms: u64) -> Result<usize, UiStateError>
    where
        F: Fn(&str) -> bool,
    {
        let last = self
            .store
            .get_item(LAST_CLEANUP_KEY)?
            .and_then(|raw| raw.parse::<u64>().ok());
        if let Some(last) = last {
            if now_ms.saturating_sub(last) < DRAFT_CLEANUP_INTERVAL_MS {
                return Ok(0);
            }
        }

        let mut removed = 0;
        for key in self.store.keys()? {
            let Some(room_id) = key.strip_prefix(DRAFT_KEY_PREFIX) else {
                continue;
            };
            if !is_known(room_id) {
                self.store.remove_item(&key)?;
                removed += 1;
            }
        }
        self.store.set_item(LAST_CLEANUP_KEY, &now_ms.to_string())?;
        debug!(removed, "composer draft cleanup finished");
        Ok(removed)
    }
}
