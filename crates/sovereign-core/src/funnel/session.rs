//! # Session Stores
//!
//! Where the funnel keeps the two values that survive a restart: the member
//! status and the display name.
//!
//! The store is injected into [`super::Funnel::new`]; nothing in the funnel
//! reaches for ambient storage.

use super::{FunnelError, MemberStatus};
use crate::primitives::{SESSION_NAME_KEY, SESSION_STATUS_KEY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted funnel state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub status: MemberStatus,
    pub name: Option<String>,
}

/// Load/save capability for [`SessionState`].
pub trait SessionStore {
    /// Read the persisted state. Absent state is the default state.
    fn load(&self) -> Result<SessionState, FunnelError>;

    /// Replace the persisted state.
    fn save(&mut self, state: &SessionState) -> Result<(), FunnelError>;

    /// Forget everything.
    fn clear(&mut self) -> Result<(), FunnelError>;
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// A session store that lives as long as the value.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    state: SessionState,
}

impl MemorySessionStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `state`.
    #[must_use]
    pub fn with_state(state: SessionState) -> Self {
        Self { state }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<SessionState, FunnelError> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &SessionState) -> Result<(), FunnelError> {
        self.state = state.clone();
        Ok(())
    }

    fn clear(&mut self) -> Result<(), FunnelError> {
        self.state = SessionState::default();
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// On-disk layout: two optional strings under fixed names.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "sovereign_status", default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(rename = "sovereign_name", default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// A session store backed by a small JSON file.
///
/// The file holds `sovereign_status` and `sovereign_name` as strings, with no
/// expiry. A missing file is an empty session. An unknown status string reads
/// as [`MemberStatus::None`].
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Use the file at `path`. The file is created on first save.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<SessionState, FunnelError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionState::default());
            }
            Err(e) => {
                return Err(FunnelError::Session(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let stored: StoredSession = serde_json::from_str(&raw).map_err(|e| {
            FunnelError::Session(format!(
                "corrupt session file {} ({} / {}): {}",
                self.path.display(),
                SESSION_STATUS_KEY,
                SESSION_NAME_KEY,
                e
            ))
        })?;

        Ok(SessionState {
            status: stored
                .status
                .as_deref()
                .map(MemberStatus::parse)
                .unwrap_or_default(),
            name: stored.name.filter(|n| !n.is_empty()),
        })
    }

    fn save(&mut self, state: &SessionState) -> Result<(), FunnelError> {
        let stored = StoredSession {
            status: state.status.as_stored().map(str::to_string),
            name: state.name.clone(),
        };
        let raw = serde_json::to_string_pretty(&stored)
            .map_err(|e| FunnelError::Session(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| {
            FunnelError::Session(format!("cannot write {}: {}", self.path.display(), e))
        })
    }

    fn clear(&mut self) -> Result<(), FunnelError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FunnelError::Session(format!(
                "cannot remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
