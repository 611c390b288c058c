//! Durable storage for proofs that have not been acknowledged yet.

use ethpay_types::proof::TransactionProof;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A proof waiting for (another) delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub proof: TransactionProof,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Set when the proof was stored without being submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parked_reason: Option<String>,
}

impl PendingSubmission {
    pub fn new(proof: TransactionProof) -> Self {
        Self {
            proof,
            attempt_count: 0,
            last_error: None,
            parked_reason: None,
        }
    }

    pub fn transaction_hash(&self) -> &str {
        &self.proof.transaction_hash
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Pending submission store {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Pending submission store {path:?} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Whole-collection persistence. Every save replaces the stored set.
pub trait SubmissionStore: Send + Sync {
    fn load(&self) -> Result<Vec<PendingSubmission>, StoreError>;
    fn save(&self, entries: &[PendingSubmission]) -> Result<(), StoreError>;
}

/// A JSON array on disk, replaced atomically through a temp-file rename.
#[derive(Debug, Clone)]
pub struct FileSubmissionStore {
    path: PathBuf,
}

impl FileSubmissionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SubmissionStore for FileSubmissionStore {
    fn load(&self) -> Result<Vec<PendingSubmission>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, entries: &[PendingSubmission]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

#[derive(Debug, Default)]
pub struct MemorySubmissionStore {
    entries: Mutex<Vec<PendingSubmission>>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubmissionStore for MemorySubmissionStore {
    fn load(&self) -> Result<Vec<PendingSubmission>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, entries: &[PendingSubmission]) -> Result<(), StoreError> {
        *self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = entries.to_vec();
        Ok(())
    }
}
