//! Storage configuration and path management for herd.
//!
//! Every path herd reads or writes is derived from a [`StorageConfig`], so
//! tests can point the whole system at a temp directory with
//! [`StorageConfig::with_roots`] instead of touching `~/.herd`.
//!
//! ## Layout
//!
//! ```text
//! ~/.herd/
//!   sessions/<session_id>.json   one state record per agent session
//!   sidebar.json                 pin counters and explicit order
//!   names.json                   custom session names
//!   groups.json                  custom group assignments
//!   config.json                  user preferences
//!   logs/                        tracing output
//! ~/.claude/settings.json        agent hook registration
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{HerdError, Result};

/// Overrides the herd root directory (default `~/.herd`).
pub const HERD_HOME_ENV: &str = "HERD_HOME";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for herd data (default: ~/.herd)
    root: PathBuf,
    /// Root directory of the agent's own configuration (default: ~/.claude)
    claude_root: PathBuf,
}

impl StorageConfig {
    /// Resolves the production layout from the home directory, honouring
    /// `HERD_HOME` for the herd root.
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().ok_or(HerdError::HomeDirNotFound)?;
        let root = std::env::var_os(HERD_HOME_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".herd"));
        Ok(Self {
            root,
            claude_root: home.join(".claude"),
        })
    }

    /// Creates a StorageConfig with a custom root directory; the agent's
    /// configuration is expected next to it.
    pub fn with_root(root: PathBuf) -> Self {
        let claude_root = root
            .parent()
            .map(|p| p.join(".claude"))
            .unwrap_or_else(|| PathBuf::from("/tmp/.claude"));
        Self { root, claude_root }
    }

    pub fn with_roots(root: PathBuf, claude_root: PathBuf) -> Self {
        Self { root, claude_root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn claude_root(&self) -> &Path {
        &self.claude_root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn sidebar_file(&self) -> PathBuf {
        self.root.join("sidebar.json")
    }

    pub fn names_file(&self) -> PathBuf {
        self.root.join("names.json")
    }

    pub fn groups_file(&self) -> PathBuf {
        self.root.join("groups.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Path to the agent's settings.json, where hooks are registered.
    pub fn claude_settings_file(&self) -> PathBuf {
        self.claude_root.join("settings.json")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directories
    // ─────────────────────────────────────────────────────────────────────────────

    /// Directory holding one state file per agent session.
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.sessions_dir(), self.logs_dir()] {
            fs::create_dir_all(&dir)
                .map_err(|e| HerdError::io(format!("create {}", dir.display()), e))?;
        }
        Ok(())
    }
}

/// Writes `bytes` to `path` through a temp file in the same directory and a
/// rename, so readers see either the old or the new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        HerdError::io(
            format!("{} has no parent directory", path.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    fs::create_dir_all(parent)
        .map_err(|e| HerdError::io(format!("create {}", parent.display()), e))?;

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| HerdError::io(format!("temp file in {}", parent.display()), e))?;
    temp.write_all(bytes)
        .map_err(|e| HerdError::io(format!("write temp for {}", path.display()), e))?;
    temp.flush()
        .map_err(|e| HerdError::io(format!("flush temp for {}", path.display()), e))?;
    temp.persist(path)
        .map_err(|e| HerdError::io(format!("persist {}", path.display()), e.error))?;
    Ok(())
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| HerdError::json(format!("serialize {}", path.display()), e))?;
    write_atomic(path, content.as_bytes())
}

/// Loads a JSON document, falling back to `T::default()` when the file is
/// missing, empty, unreadable or corrupt.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable file, using defaults");
            return T::default();
        }
    };
    if content.trim().is_empty() {
        return T::default();
    }
    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt JSON, using defaults");
            T::default()
        }
    }
}
