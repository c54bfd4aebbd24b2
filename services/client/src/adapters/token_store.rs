//! services/client/src/adapters/token_store.rs
//!
//! Implementations of the `TokenStore` port: a file-backed slot that survives
//! restarts, and an in-memory one for ephemeral sessions and tests.

use notes_core::ports::{PortError, PortResult, TokenStore};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Stores the bearer token as the sole content of one file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> PortError {
    PortError::Storage(format!("{}: {}", path.display(), err))
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> PortResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }

    fn set(&self, token: &str) -> PortResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| storage_error(parent, e))?;
        }
        fs::write(&self.path, token.trim()).map_err(|e| storage_error(&self.path, e))?;
        debug!("Stored bearer token at {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> PortResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed bearer token at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }
}

/// A token slot that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Mutex::new(Some(token.to_string())),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> PortResult<Option<String>> {
        Ok(self.slot().clone())
    }

    fn set(&self, token: &str) -> PortResult<()> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> PortResult<()> {
        *self.slot() = None;
        Ok(())
    }

    fn clear_if(&self, expected: &str) -> PortResult<bool> {
        let mut slot = self.slot();
        if slot.as_deref() != Some(expected) {
            return Ok(false);
        }
        *slot = None;
        Ok(true)
    }
}
