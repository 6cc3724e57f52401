// Persistent session storage.
//
// `KeyValueStorage` is the host's durable key-value store (the equivalent of
// browser local storage). `SessionStore` layers the four session keys on top
// of it and never fails on read: missing or malformed entries read as absent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::role::Portal;
use crate::types::{AuthData, UserRecord};

pub const TOKEN_KEY: &str = "token";
pub const AUTH_DATA_KEY: &str = "authData";
pub const PENDING_ROLE_KEY: &str = "pendingRole";
pub const NEEDS_PROFILE_COMPLETION_KEY: &str = "needsProfileCompletion";

const ALL_KEYS: [&str; 4] = [
    TOKEN_KEY,
    AUTH_DATA_KEY,
    PENDING_ROLE_KEY,
    NEEDS_PROFILE_COMPLETION_KEY,
];

/// A durable string key-value store.
///
/// `set_many` and `delete_many` apply all entries as one update.
#[async_trait]
pub trait KeyValueStorage: Send + Sync + std::fmt::Debug {
    /// Get a value by key. Returns `None` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Get several keys from one consistent view of the store, in `keys` order.
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError>;

    /// Set several key-value pairs at once.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError>;

    /// Delete several keys at once. Missing keys are ignored.
    async fn delete_many(&self, keys: &[&str]) -> Result<(), StorageError>;
}

// ─── In-memory backend ──────────────────────────────────────────────

/// Volatile storage backed by a `HashMap`. Used by tests and embedders that
/// bring their own persistence.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    store: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.store
            .lock()
            .map_err(|_| StorageError::Operation("memory storage lock poisoned".into()))
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        let store = self.lock()?;
        Ok(keys.iter().map(|key| store.get(*key).cloned()).collect())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let mut store = self.lock()?;
        for (key, value) in entries {
            store.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut store = self.lock()?;
        for key in keys {
            store.remove(*key);
        }
        Ok(())
    }
}

// ─── File backend ───────────────────────────────────────────────────

/// Storage kept in a single JSON object file.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// original, so readers never see a partially applied update. A missing or
/// unparsable file reads as empty.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&data) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring unreadable session file: {}", e);
                Ok(HashMap::new())
            }
        }
    }

    async fn persist(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let data = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load().await?.remove(key))
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        let map = self.load().await?;
        Ok(keys.iter().map(|key| map.get(*key).cloned()).collect())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        self.persist(&map).await
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.persist(&map).await
    }
}

// ─── Session store ──────────────────────────────────────────────────

/// Everything the session persists, as read back from storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredSession {
    pub token: Option<String>,
    pub auth_data: Option<AuthData>,
    pub pending_role: Option<Portal>,
    pub needs_profile_completion: bool,
}

impl StoredSession {
    pub fn user(&self) -> Option<&UserRecord> {
        self.auth_data.as_ref().map(|d| &d.user)
    }
}

/// The session's view of persistent storage: exactly four keys.
#[derive(Debug, Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStorage>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStorage>) -> Self {
        Self { backend }
    }

    /// Persist the token and identity together.
    pub async fn write(&self, token: &str, user: &UserRecord) -> Result<(), StorageError> {
        let entries = Self::identity_entries(token, user)?;
        self.backend.set_many(&entries).await
    }

    /// Persist the token, the identity and the bridge flags for `portal` in
    /// one update.
    pub async fn write_bridge_account(
        &self,
        token: &str,
        user: &UserRecord,
        portal: Portal,
    ) -> Result<(), StorageError> {
        let mut entries = Self::identity_entries(token, user)?;
        entries.extend(Self::bridge_entries(portal));
        self.backend.set_many(&entries).await
    }

    fn identity_entries(
        token: &str,
        user: &UserRecord,
    ) -> Result<Vec<(&'static str, String)>, StorageError> {
        let auth = AuthData {
            token: token.to_string(),
            user: user.clone(),
        };
        Ok(vec![
            (TOKEN_KEY, token.to_string()),
            (AUTH_DATA_KEY, serde_json::to_string(&auth)?),
        ])
    }

    fn bridge_entries(portal: Portal) -> [(&'static str, String); 2] {
        [
            (PENDING_ROLE_KEY, portal.as_str().to_string()),
            (NEEDS_PROFILE_COMPLETION_KEY, "true".to_string()),
        ]
    }

    /// Record that the account holds the bridge role and must complete a
    /// profile for `portal`.
    pub async fn mark_bridge_role(&self, portal: Portal) -> Result<(), StorageError> {
        self.backend.set_many(&Self::bridge_entries(portal)).await
    }

    pub async fn clear_bridge_flags(&self) -> Result<(), StorageError> {
        self.backend
            .delete_many(&[PENDING_ROLE_KEY, NEEDS_PROFILE_COMPLETION_KEY])
            .await
    }

    /// Read all four keys in one pass. Unreadable entries are reported as
    /// absent.
    pub async fn read_all(&self) -> StoredSession {
        let values = match self.backend.get_many(&ALL_KEYS).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("failed to read session storage: {}", e);
                return StoredSession::default();
            }
        };
        let [token, auth_data, pending_role, needs_profile_completion]: [Option<String>; 4] =
            match values.try_into() {
                Ok(values) => values,
                Err(_) => return StoredSession::default(),
            };

        let auth_data = auth_data.and_then(|raw| {
            serde_json::from_str::<AuthData>(&raw)
                .map_err(|e| tracing::warn!("ignoring malformed {}: {}", AUTH_DATA_KEY, e))
                .ok()
        });
        let pending_role = pending_role.and_then(|raw| Portal::parse(raw.trim_matches('"')));
        let needs_profile_completion =
            needs_profile_completion.is_some_and(|raw| raw.trim_matches('"') == "true");

        StoredSession {
            token,
            auth_data,
            pending_role,
            needs_profile_completion,
        }
    }

    /// Remove every session key.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.backend.delete_many(&ALL_KEYS).await
    }
}
