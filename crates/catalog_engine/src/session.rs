use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use catalog_core::same_origin;
use harvest_logging::{harvest_debug, harvest_info, harvest_warn};
use serde::{Deserialize, Serialize};

use crate::driver::{DriverError, PageDriver};
use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

/// Serialized browser state captured after a successful login.
///
/// Validity is never inferred from this data; the remote system is the source
/// of truth and is consulted through [`SessionStore::probe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBlob {
    pub origin: String,
    pub captured_utc: String,
    pub cookies: Vec<StoredCookie>,
    #[serde(default)]
    pub local_storage: Vec<(String, String)>,
}

/// Loads, saves and validates the stored session at a fixed path.
pub struct SessionStore {
    path: PathBuf,
    authenticated_marker: String,
    probe_timeout: Duration,
}

impl SessionStore {
    pub fn new(path: PathBuf, authenticated_marker: String, probe_timeout: Duration) -> Self {
        Self {
            path,
            authenticated_marker,
            probe_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored session. Absent, unreadable or malformed files all
    /// yield `None`; the caller treats that as "must authenticate".
    pub fn load(&self) -> Option<SessionBlob> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return None;
            }
            Err(err) => {
                harvest_warn!("Failed to read stored session from {:?}: {}", self.path, err);
                return None;
            }
        };

        match serde_json::from_str::<SessionBlob>(&content) {
            Ok(blob) => {
                harvest_debug!("Loaded stored session for {}", blob.origin);
                Some(blob)
            }
            Err(err) => {
                harvest_warn!("Failed to parse stored session {:?}: {}", self.path, err);
                None
            }
        }
    }

    /// Overwrites the stored session atomically; a crash mid-write never
    /// corrupts a previously valid session file.
    pub fn save(&self, blob: &SessionBlob) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(blob).map_err(|e| {
            PersistError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        AtomicFileWriter::new(self.path.clone()).write(&content)?;
        harvest_info!("Stored session saved to {:?}", self.path);
        Ok(())
    }

    /// Empirically checks whether the session still authenticates against the
    /// target: apply it, navigate, and wait (bounded) for an element that
    /// only exists when authenticated. Timeout means invalid, not fatal.
    pub async fn probe(
        &self,
        driver: &dyn PageDriver,
        target_url: &str,
        blob: &SessionBlob,
    ) -> Result<bool, DriverError> {
        if !same_origin(&blob.origin, target_url) {
            harvest_info!(
                "Stored session origin {} does not match target; discarding",
                blob.origin
            );
            return Ok(false);
        }

        driver.apply_session(blob).await?;
        driver.navigate(target_url).await?;
        match driver
            .wait_for(&self.authenticated_marker, self.probe_timeout)
            .await
        {
            Ok(()) => Ok(true),
            Err(DriverError::WaitTimeout { .. }) | Err(DriverError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
