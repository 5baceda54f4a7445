//! File-backed session state records.
//!
//! The hook process writes one file per agent session into the sessions
//! directory; the dashboard only reads them.
//!
//! # File Format
//!
//! ```json
//! {
//!   "session_id": "8f0c…",
//!   "tmux_pane": "%12",
//!   "state": "working",
//!   "current_tool": "Bash",
//!   "project_path": "/home/u/dev/herd",
//!   "updated_at": "2026-01-30T12:00:00Z"
//! }
//! ```
//!
//! # Defensive Reads
//!
//! A writer may be mid-rename or a user may drop junk into the directory, so
//! `read_all` skips anything it cannot use instead of failing:
//! - files without the `.json` extension
//! - unreadable files
//! - invalid JSON or records missing `session_id`/`updated_at`
//!
//! # Atomic Writes
//!
//! Writes go through a temp file in the same directory plus a rename.

use std::path::{Path, PathBuf};

use fs_err as fs;
use herd_protocol::{StateRecord, STATE_FILE_EXTENSION};

use crate::error::{HerdError, Result};
use crate::storage::write_json_atomic;

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state file for `session_id`.
    ///
    /// Ids that could escape the directory are rejected.
    pub fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        let invalid = session_id.trim().is_empty()
            || session_id == "."
            || session_id == ".."
            || session_id.contains(['/', '\\', '\0']);
        if invalid {
            return Err(HerdError::InvalidSessionId(session_id.to_string()));
        }
        Ok(self
            .dir
            .join(format!("{session_id}.{STATE_FILE_EXTENSION}")))
    }

    pub fn write(&self, record: &StateRecord) -> Result<PathBuf> {
        let path = self.path_for(&record.session_id)?;
        write_json_atomic(&path, record)?;
        Ok(path)
    }

    /// Reads every usable record, ordered by file name.
    ///
    /// A missing directory yields an empty list. Only failing to list an
    /// existing directory is an error.
    pub fn read_all(&self) -> Result<Vec<StateRecord>> {
        Ok(self
            .read_all_with_paths()?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    pub fn read_all_with_paths(&self) -> Result<Vec<(PathBuf, StateRecord)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HerdError::io("read state directory", e)),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_state_file(path))
            .collect();
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match read_record(&path) {
                Some(record) => records.push((path, record)),
                None => tracing::debug!(path = %path.display(), "Skipping unusable state file"),
            }
        }
        Ok(records)
    }
}

pub fn is_state_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(STATE_FILE_EXTENSION)
}

fn read_record(path: &Path) -> Option<StateRecord> {
    let content = fs::read_to_string(path).ok()?;
    let record: StateRecord = serde_json::from_str(&content).ok()?;
    if record.session_id.trim().is_empty() {
        return None;
    }
    Some(record)
}
