//! User preferences stored in `~/.herd/config.json`.
//!
//! Every field has a default, so a partial or missing file is fine. A corrupt
//! file is treated as missing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::storage::{load_json_or_default, StorageConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directories whose immediate subdirectories are offered as projects
    /// when launching a new session. `~` is expanded.
    pub project_dirs: Vec<String>,
    /// Period of the fast timer that re-fetches the observed pane's output.
    pub capture_interval_ms: u64,
    /// Period of the slow timer that runs a full rediscovery pass.
    pub refresh_interval_secs: u64,
    /// Delay of the single extra discovery pass after launching a session.
    pub quick_retry_ms: u64,
    pub scrollback_lines: usize,
    /// Command typed into a freshly created window.
    pub agent_command: String,
    pub sidebar_width: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_dirs: vec!["~".to_string()],
            capture_interval_ms: 100,
            refresh_interval_secs: 3,
            quick_retry_ms: 500,
            scrollback_lines: 2000,
            agent_command: "claude".to_string(),
            sidebar_width: 32,
        }
    }
}

impl Config {
    pub fn load(storage: &StorageConfig) -> Self {
        Self::load_from(&storage.config_file())
    }

    pub fn load_from(path: &Path) -> Self {
        let mut config: Config = load_json_or_default(path);
        if config.project_dirs.is_empty() {
            config.project_dirs = Config::default().project_dirs;
        }
        config
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms.max(10))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn quick_retry(&self) -> Duration {
        Duration::from_millis(self.quick_retry_ms)
    }

    /// Project directories with a leading `~` replaced by `home`.
    pub fn expanded_project_dirs(&self, home: Option<&Path>) -> Vec<PathBuf> {
        self.project_dirs
            .iter()
            .map(|dir| expand_home(dir, home))
            .collect()
    }
}

/// Expands a leading `~` or `~/` against `home`. Other paths pass through.
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}
