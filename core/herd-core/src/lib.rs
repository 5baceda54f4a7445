//! # herd-core
//!
//! Core library for herd, the tmux dashboard for agent sessions. Everything
//! here is UI-free and testable without a terminal or a tmux server.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. The dashboard runs blocking calls on
//!   its own worker threads.
//! - **Graceful degradation**: Missing or corrupt files load as empty/default
//!   values; unusable state records are skipped, never fatal.
//! - **Injected paths**: Every store takes its path from a [`StorageConfig`],
//!   so tests run against temp directories.
//! - **Seams as traits**: tmux and git sit behind [`ControlPlane`] and
//!   [`GitProbe`]; `testing` provides in-memory doubles.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use herd_core::{Discovery, GitCli, StateStore, StorageConfig, TmuxClient};
//!
//! let storage = StorageConfig::from_env()?;
//! let discovery = Discovery::new(
//!     StateStore::new(storage.sessions_dir()),
//!     Arc::new(TmuxClient::new()),
//!     Arc::new(GitCli),
//! );
//! let sessions = discovery.run()?;
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod git;
pub mod kv;
pub mod ordering;
pub mod projects;
pub mod setup;
pub mod sidebar;
pub mod state;
pub mod storage;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod tmux;
pub mod types;
pub mod view;

// Re-export commonly used items at crate root
pub use config::{expand_home, Config};
pub use discovery::{discover, Discovery};
pub use error::{HerdError, Result};
pub use git::{GitCache, GitCli, GitInfo, GitProbe, Worktree};
pub use kv::KvStore;
pub use ordering::{carry_forward, key_changes, live_keys, merge_sessions, move_session, sort_sessions, Direction};
pub use projects::{filter_projects, scan_projects, shorten_path};
pub use setup::{hook_command, hooks_installed, install_hooks, InstallResult};
pub use sidebar::{SidebarState, SidebarStore};
pub use state::{StateStore, StateWatcher, WatchStreams};
pub use storage::{write_atomic, write_json_atomic, StorageConfig};
pub use tmux::{is_agent_pane, ControlPlane, PaneRecord, TmuxClient};
pub use types::{session_key, Session};
pub use view::{apply_filter, build_view_items, clean_capture, worst_state, ViewItem};
