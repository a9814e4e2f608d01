use std::sync::{Arc, RwLock};

use tracing::{debug, error, info};

use crate::config::types::{StoreConfig, StoreType};
use crate::error::StoreError;
use crate::store::credentials::CredentialPair;
use crate::store::persistence::{CredentialPersistence, FilePersistence, MemoryPersistence};
use crate::utils::lock::RwLockExt;

/// Current credential pair of one client, shared by its dispatcher,
/// refresh coordinator and terminator.
///
/// Reads and writes are synchronous. Persistence is write-through; a failed
/// write is logged and the in-memory pair stays authoritative.
///
/// `replace` and `clear` call the persistence backend while holding the write
/// lock. For [`FilePersistence`] that is blocking `std::fs` I/O on the calling
/// thread, which may be a tokio worker (refresh settle, login, logout). The
/// file is a single small JSON document; readers wait for the write at most.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    current: RwLock<Option<CredentialPair>>,
    persistence: Box<dyn CredentialPersistence>,
}

impl CredentialStore {
    /// Loads whatever the backend persisted by a previous run.
    pub fn open(persistence: impl CredentialPersistence + 'static) -> Result<Self, StoreError> {
        let current = persistence.load()?;
        if current.is_some() {
            info!("restored persisted session");
        }
        Ok(Self {
            inner: Arc::new(StoreInner {
                current: RwLock::new(current),
                persistence: Box::new(persistence),
            }),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                current: RwLock::new(None),
                persistence: Box::new(MemoryPersistence),
            }),
        }
    }

    pub fn from_config(cfg: &StoreConfig) -> Result<Self, StoreError> {
        match (cfg.store_type, cfg.path.as_ref()) {
            (StoreType::File, Some(path)) => Self::open(FilePersistence::new(path)),
            _ => Ok(Self::in_memory()),
        }
    }

    pub fn get_access(&self) -> Option<String> {
        self.inner
            .current
            .read_or_recover()
            .as_ref()
            .map(|pair| pair.access_token.clone())
    }

    pub fn get_refresh(&self) -> Option<String> {
        self.inner
            .current
            .read_or_recover()
            .as_ref()
            .map(|pair| pair.refresh_token.clone())
    }

    pub fn get(&self) -> Option<CredentialPair> {
        self.inner.current.read_or_recover().clone()
    }

    pub fn is_established(&self) -> bool {
        self.inner.current.read_or_recover().is_some()
    }

    /// Replaces both tokens at once.
    pub fn set(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
        self.replace(CredentialPair::new(access_token, refresh_token));
    }

    pub fn replace(&self, pair: CredentialPair) {
        let mut current = self.inner.current.write_or_recover();
        if let Err(e) = self.inner.persistence.save(&pair) {
            error!("persisting credentials failed: {}", e);
        }
        *current = Some(pair);
        debug!("credentials updated");
    }

    /// Removes both tokens. Calling it on an empty store is a no-op.
    pub fn clear(&self) {
        let mut current = self.inner.current.write_or_recover();
        if current.take().is_none() {
            return;
        }
        if let Err(e) = self.inner.persistence.remove() {
            error!("removing persisted credentials failed: {}", e);
        }
        debug!("credentials cleared");
    }
}
