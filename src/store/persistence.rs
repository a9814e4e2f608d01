use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::credentials::CredentialPair;

/// Where the credential pair lives between process runs.
pub trait CredentialPersistence: Send + Sync {
    fn load(&self) -> Result<Option<CredentialPair>, StoreError>;
    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError>;
    fn remove(&self) -> Result<(), StoreError>;
}

/// Nothing survives the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryPersistence;

impl CredentialPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<CredentialPair>, StoreError> {
        Ok(None)
    }

    fn save(&self, _: &CredentialPair) -> Result<(), StoreError> {
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCredentials {
    access_token: Option<String>,
    refresh_token: Option<String>,
    updated_at: DateTime<Utc>,
}

/// JSON file written through a temp file + rename, so readers never see half a pair.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialPersistence for FilePersistence {
    fn load(&self) -> Result<Option<CredentialPair>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no credential file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let persisted: PersistedCredentials = serde_json::from_str(&raw)?;
        match (persisted.access_token, persisted.refresh_token) {
            (Some(access), Some(refresh)) => Ok(Some(CredentialPair::new(access, refresh))),
            (None, None) => Ok(None),
            _ => {
                warn!(
                    "credential file {} holds a partial pair, ignoring it",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let persisted = PersistedCredentials {
            access_token: Some(pair.access_token.clone()),
            refresh_token: Some(pair.refresh_token.clone()),
            updated_at: Utc::now(),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, serde_json::to_vec_pretty(&persisted)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
