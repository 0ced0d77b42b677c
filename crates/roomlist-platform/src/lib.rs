use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use thiserror::Error;
use tracing::debug;

pub mod drafts;
pub mod history;

pub use drafts::{ComposerDraft, DraftStore};
pub use history::SendHistory;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UiStateError {
    #[error("ui state store unavailable: {0}")]
    Unavailable(String),
    #[error("ui state store backend failure: {0}")]
    Backend(String),
    #[error("ui state value could not be encoded: {0}")]
    Encoding(String),
}

/// String key/value storage for client UI state.
///
/// `get_item` returns `Ok(None)` for absent keys; removing an absent key is
/// not an error.
pub trait UiStateStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, UiStateError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), UiStateError>;

    fn remove_item(&self, key: &str) -> Result<(), UiStateError>;

    fn keys(&self) -> Result<Vec<String>, UiStateError>;
}

impl<T: UiStateStore + ?Sized> UiStateStore for Arc<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>, UiStateError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), UiStateError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), UiStateError> {
        (**self).remove_item(key)
    }

    fn keys(&self) -> Result<Vec<String>, UiStateError> {
        (**self).keys()
    }
}

fn poisoned() -> UiStateError {
    UiStateError::Backend("poisoned lock".to_owned())
}

#[derive(Clone, Default)]
pub struct InMemoryUiStateStore {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl UiStateStore for InMemoryUiStateStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, UiStateError> {
        let data = self.data.read().map_err(|_| poisoned())?;
        Ok(data.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), UiStateError> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        data.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), UiStateError> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        data.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, UiStateError> {
        let data = self.data.read().map_err(|_| poisoned())?;
        let mut keys: Vec<_> = data.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Persists the whole key space as one JSON object, rewritten on every change.
#[derive(Clone)]
pub struct JsonFileUiStateStore {
    path: PathBuf,
    data: Arc<RwLock<BTreeMap<String, String>>>,
}

impl JsonFileUiStateStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, UiStateError> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|err| UiStateError::Encoding(err.to_string()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(UiStateError::Unavailable(err.to_string())),
        };
        debug!(path = %path.display(), entries = data.len(), "opened ui state file");
        Ok(Self {
            path,
            data: Arc::new(RwLock::new(data)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, data: &BTreeMap<String, String>) -> Result<(), UiStateError> {
        let encoded = serde_json::to_string_pretty(data)
            .map_err(|err| UiStateError::Encoding(err.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| UiStateError::Backend(err.to_string()))?;
        }
        fs::write(&self.path, encoded).map_err(|err| UiStateError::Backend(err.to_string()))
    }
}

impl UiStateStore for JsonFileUiStateStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, UiStateError> {
        let data = self.data.read().map_err(|_| poisoned())?;
        Ok(data.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), UiStateError> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        data.insert(key.to_owned(), value.to_owned());
        self.flush(&data)
    }

    fn remove_item(&self, key: &str) -> Result<(), UiStateError> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        if data.remove(key).is_some() {
            self.flush(&data)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, UiStateError> {
        let data = self.data.read().map_err(|_| poisoned())?;
        Ok(data.keys().cloned().collect())
    }
}

/// Prefixes every key with `<scope>:` so several features can share a store.
#[derive(Clone)]
pub struct ScopedUiStateStore<S: UiStateStore> {
    inner: S,
    prefix: String,
}

impl<S: UiStateStore> ScopedUiStateStore<S> {
    pub fn new(inner: S, scope: impl AsRef<str>) -> Self {
        Self {
            inner,
            prefix: format!("{}:", scope.as_ref()),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

impl<S: UiStateStore> UiStateStore for ScopedUiStateStore<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, UiStateError> {
        self.inner.get_item(&self.scoped(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), UiStateError> {
        self.inner.set_item(&self.scoped(key), value)
    }

    fn remove_item(&self, key: &str) -> Result<(), UiStateError> {
        self.inner.remove_item(&self.scoped(key))
    }

    fn keys(&self) -> Result<Vec<String>, UiStateError> {
        Ok(self
            .inner
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(str::to_owned))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    #[derive(Default)]
    pub struct FailingStore;

    impl UiStateStore for FailingStore {
        fn get_item(&self, _key: &str) -> Result<Option<String>, UiStateError> {
            Err(UiStateError::Unavailable("mock outage".to_owned()))
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), UiStateError> {
            Err(UiStateError::Unavailable("mock outage".to_owned()))
        }

        fn remove_item(&self, _key: &str) -> Result<(), UiStateError> {
            Err(UiStateError::Unavailable("mock outage".to_owned()))
        }

        fn keys(&self) -> Result<Vec<String>, UiStateError> {
            Err(UiStateError::Unavailable("mock outage".to_owned()))
        }
    }
}
