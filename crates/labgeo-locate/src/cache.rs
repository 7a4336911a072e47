//! Persisted last-known location and permission grant.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use labgeo_core::ResolvedLocation;

use crate::error::StoreError;

pub const LOCATION_KEY: &str = "labgeo.location";
pub const PERMISSION_KEY: &str = "labgeo.location.permission";

const PERMISSION_GRANTED: &str = "granted";

/// Synchronous string key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process store; contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves either the old or the new contents. A file that
/// is not a JSON object is treated as empty and replaced on the next write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "storage file is not a JSON object, starting empty"
                );
                Ok(HashMap::new())
            }
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = lock(&self.guard);
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = lock(&self.guard);
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = lock(&self.guard);
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// Last successful [`ResolvedLocation`] plus the permission-grant flag.
///
/// The location record is always replaced wholesale. Within one cache
/// instance, stored acquisition stamps never go backwards.
pub struct LocationCache {
    store: Arc<dyn KeyValueStore>,
    last_written_at: Mutex<Option<i64>>,
}

impl LocationCache {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            last_written_at: Mutex::new(None),
        }
    }

    /// Overwrite the persisted location and return the value as stored.
    ///
    /// A location stamped earlier than the previous write from this instance
    /// is re-stamped with the previous stamp.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the store write fails.
    pub fn save(&self, location: ResolvedLocation) -> Result<ResolvedLocation, StoreError> {
        let mut last = lock(&self.last_written_at);
        let stored = match *last {
            Some(previous) if location.acquired_at_epoch_millis < previous => {
                tracing::debug!(
                    acquired_at = location.acquired_at_epoch_millis,
                    previous,
                    "clamping location timestamp to previous write"
                );
                ResolvedLocation {
                    acquired_at_epoch_millis: previous,
                    ..location
                }
            }
            _ => location,
        };

        let json = serde_json::to_string(&stored)?;
        self.store.set(LOCATION_KEY, &json)?;
        *last = Some(stored.acquired_at_epoch_millis);
        Ok(stored)
    }

    /// The persisted location, or `None` when absent or unreadable.
    ///
    /// A record that fails to parse is removed.
    #[must_use]
    pub fn load(&self) -> Option<ResolvedLocation> {
        let raw = match self.store.get(LOCATION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cached location");
                return None;
            }
        };

        match serde_json::from_str::<ResolvedLocation>(&raw) {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::warn!(error = %e, "discarding corrupt cached location");
                if let Err(e) = self.store.remove(LOCATION_KEY) {
                    tracing::warn!(error = %e, "failed to remove corrupt cached location");
                }
                None
            }
        }
    }

    /// The persisted location if it is younger than `max_age` at `now`.
    #[must_use]
    pub fn load_fresh(&self, now_epoch_millis: i64, max_age: Duration) -> Option<ResolvedLocation> {
        self.load()
            .filter(|location| location.is_fresh(now_epoch_millis, max_age))
    }

    /// Remove the persisted location and the permission-grant flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be written.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(LOCATION_KEY)?;
        self.store.remove(PERMISSION_KEY)
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be written.
    pub fn record_permission_granted(&self) -> Result<(), StoreError> {
        self.store.set(PERMISSION_KEY, PERMISSION_GRANTED)
    }

    #[must_use]
    pub fn permission_granted(&self) -> bool {
        matches!(
            self.store.get(PERMISSION_KEY),
            Ok(Some(ref v)) if v == PERMISSION_GRANTED
        )
    }
}
