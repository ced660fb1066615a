//! Preference store
//!
//! Owns the persisted settings record. Reads never fail: a broken backend is
//! skipped for the rest of the session, and when every backend is gone the
//! record lives in memory only. The only error a caller ever sees is a
//! rejected import.

use std::collections::HashMap;

use crate::settings::{parse_and_migrate, SettingsError, SettingsPatch, SettingsRecord, CURRENT_SCHEMA_VERSION};

/// Key the record is stored under.
pub const SETTINGS_KEY: &str = "calmtube.settings";

/// Error type for storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage quota exceeded")]
    QuotaExceeded,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value text storage.
pub trait StorageBackend {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Volatile backend, also the building block for tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut backend = Self::new();
        backend.entries.insert(key.to_string(), value.to_string());
        backend
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Handle returned by [`PreferenceStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&SettingsRecord)>;

/// Settings store over an ordered chain of backends.
pub struct PreferenceStore {
    backends: Vec<Box<dyn StorageBackend>>,
    /// Index of the first backend that has not failed yet
    active: usize,
    cache: Option<SettingsRecord>,
    /// Record of last resort once every backend has failed
    session: Option<SettingsRecord>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl PreferenceStore {
    /// Build a store; backends are tried in order, primary first.
    pub fn new(backends: Vec<Box<dyn StorageBackend>>) -> Self {
        Self {
            backends,
            active: 0,
            cache: None,
            session: None,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Store without persistence.
    pub fn in_memory() -> Self {
        Self::new(vec![Box::new(MemoryBackend::new())])
    }

    /// Name of the backend currently in use, or None when memory-only.
    pub fn active_backend(&self) -> Option<&'static str> {
        self.backends.get(self.active).map(|b| b.name())
    }

    /// Current record, migrated and cached.
    pub fn get(&mut self) -> SettingsRecord {
        if let Some(cached) = &self.cache {
            return cached.clone();
        }
        let record = self.read();
        self.cache = Some(record.clone());
        record
    }

    /// Shallow-merge a patch over the current record and persist it.
    pub fn set(&mut self, patch: SettingsPatch) {
        let mut record = self.get();
        patch.apply_to(&mut record);
        self.commit(record);
    }

    /// Replace the record from serialized text.
    ///
    /// Either the whole import is written or nothing is.
    pub fn import_from(&mut self, text: &str) -> Result<(), SettingsError> {
        let record = parse_and_migrate(text)?;
        log::info!("importing settings");
        self.commit(record);
        Ok(())
    }

    /// Serialize the current record in the portable pretty-printed form.
    pub fn export_to(&mut self) -> String {
        self.get().to_json_pretty()
    }

    /// Replace the record with compiled-in defaults.
    pub fn reset(&mut self) {
        log::info!("resetting settings to defaults");
        self.commit(SettingsRecord::default());
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SettingsRecord) + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.listeners.retain(|(listener, _)| *listener != id);
    }

    /// Drop the cached record without notifying.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Another surface changed the stored record: re-read and notify.
    pub fn notify_external_change(&mut self) {
        self.invalidate();
        let record = self.get();
        self.dispatch(&record);
    }

    fn commit(&mut self, mut record: SettingsRecord) {
        record.schema_version = CURRENT_SCHEMA_VERSION;
        self.invalidate();
        self.write(&record);
        self.cache = Some(record.clone());
        self.dispatch(&record);
    }

    fn dispatch(&mut self, record: &SettingsRecord) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(record);
        }
    }

    fn read(&mut self) -> SettingsRecord {
        let stored = loop {
            let Some(backend) = self.backends.get(self.active) else {
                return self.session.clone().unwrap_or_default();
            };
            match backend.load(SETTINGS_KEY) {
                Ok(stored) => break stored,
                Err(e) => self.degrade(e),
            }
        };

        let Some(text) = stored else {
            // Created on first access
            let record = SettingsRecord::default();
            self.write(&record);
            return record;
        };

        let upgrade = needs_upgrade(&text);
        match parse_and_migrate(&text) {
            Ok(record) => {
                if upgrade {
                    self.write(&record);
                }
                record
            }
            Err(e) => {
                log::warn!("stored settings unreadable, using defaults: {}", e);
                SettingsRecord::default()
            }
        }
    }

    fn write(&mut self, record: &SettingsRecord) {
        let text = match serde_json::to_string(record) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("failed to serialize settings: {}", e);
                return;
            }
        };
        while let Some(backend) = self.backends.get_mut(self.active) {
            match backend.save(SETTINGS_KEY, &text) {
                Ok(()) => return,
                Err(e) => self.degrade(e),
            }
        }
        self.session = Some(record.clone());
    }

    fn degrade(&mut self, error: StorageError) {
        let failed = self.backends[self.active].name();
        self.active += 1;
        match self.active_backend() {
            Some(next) => log::warn!("storage '{}' failed ({}); falling back to '{}'", failed, error, next),
            None => log::warn!("storage '{}' failed ({}); keeping settings in memory", failed, error),
        }
    }
}

/// Whether stored text carries an older schema version.
fn needs_upgrade(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| value.get("schemaVersion").and_then(|v| v.as_u64()))
        .map_or(true, |version| version < u64::from(CURRENT_SCHEMA_VERSION))
}
