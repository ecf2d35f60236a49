//! Key-value preference store and the weather cache kept in it.

use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::{Error, StoreError},
    model::WeatherResponse,
};

/// Key holding the last successful weather payload.
pub const WEATHER_RESPONSE_KEY: &str = "weather_response_data";

/// String-to-string preference storage.
///
/// Writers do not coordinate with each other; every `put` replaces the whole
/// value for its key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Preferences backed by a JSON object on disk.
///
/// The file is read once on open; each `put` rewrites it before returning.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| StoreError::Corrupt(path.clone(), e))?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::Read(path, e)),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "opened preference store");

        Ok(Self { path, entries: Mutex::new(entries) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Write(self.path.clone(), e))?;
        }

        let json = serde_json::to_string_pretty(entries).map_err(StoreError::Encode)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::Write(tmp.clone(), e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::Write(self.path.clone(), e))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }
}

/// In-process preferences; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The last successful weather payload, stored as JSON under [`WEATHER_RESPONSE_KEY`].
#[derive(Clone)]
pub struct WeatherCache {
    store: Arc<dyn KeyValueStore>,
}

impl WeatherCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, response: &WeatherResponse) -> Result<(), Error> {
        let json = serde_json::to_string(response).map_err(StoreError::Encode)?;
        self.store.put(WEATHER_RESPONSE_KEY, &json)?;
        Ok(())
    }

    /// `None` until the first successful fetch has been saved.
    pub fn load(&self) -> Result<Option<WeatherResponse>, Error> {
        match self.store.get(WEATHER_RESPONSE_KEY)? {
            Some(json) if !json.is_empty() => serde_json::from_str(&json)
                .map(Some)
                .map_err(Error::Deserialization),
            _ => Ok(None),
        }
    }
}

impl std::fmt::Debug for WeatherCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherCache").finish_non_exhaustive()
    }
}
