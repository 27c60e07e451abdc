use std::{collections::HashMap, path::PathBuf, sync::Arc};

use {
    async_trait::async_trait,
    prophet_config::{StorageBackend, StorageConfig},
    tokio::sync::{Mutex, RwLock},
    tracing::{debug, info},
};

use crate::{
    error::StorageError,
    sqlite::SqliteCredentialStore,
    types::{CREDENTIAL_KEY, TokenSet},
};

/// Durable home of the single shared credential.
///
/// `load` returning `Ok(None)` is the normal first-run state: the
/// authorization grant has not completed yet. A `save` is never observed
/// half-written by a concurrent `load`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<TokenSet>, StorageError>;

    /// Overwrite the record.
    async fn save(&self, tokens: &TokenSet) -> Result<(), StorageError>;

    /// Forget the record so the next visit starts the grant again.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Open the backend selected in the `[storage]` config section.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn CredentialStore>, StorageError> {
    let store: Arc<dyn CredentialStore> = match config.backend {
        StorageBackend::File => Arc::new(FileCredentialStore::new(config.resolved_path())),
        StorageBackend::Sqlite => {
            Arc::new(SqliteCredentialStore::open(&config.resolved_path()).await?)
        },
        StorageBackend::Memory => Arc::new(MemoryCredentialStore::new()),
    };
    info!(backend = ?config.backend, "credential store ready");
    Ok(store)
}

fn record_key() -> String {
    format!("{}/{}", CREDENTIAL_KEY.0, CREDENTIAL_KEY.1)
}

/// JSON file storage, `~/.prophet/credentials.json` by default.
///
/// The file maps `kind/name` to a record so it can sit next to other
/// entries; only the `Credentials/Credentials` entry is touched.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, TokenSet>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a sibling temp file and rename over the target.
    fn write_map(&self, map: &HashMap<String, TokenSet>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &data)?;

        // Set file permissions to 0600 on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<TokenSet>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map()?.remove(&record_key()))
    }

    async fn save(&self, tokens: &TokenSet) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map()?;
        map.insert(record_key(), tokens.clone());
        self.write_map(&map)?;
        debug!(path = %self.path.display(), "saved credential");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map()?;
        if map.remove(&record_key()).is_some() {
            self.write_map(&map)?;
            debug!(path = %self.path.display(), "cleared credential");
        }
        Ok(())
    }
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: RwLock<Option<TokenSet>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<TokenSet>, StorageError> {
        Ok(self.record.read().await.clone())
    }

    async fn save(&self, tokens: &TokenSet) -> Result<(), StorageError> {
        *self.record.write().await = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.record.write().await = None;
        Ok(())
    }
}
