//! Test doubles for the control plane and git lookups.
//!
//! Compiled for this crate's tests and for downstream crates that enable the
//! `test-helpers` feature.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{HerdError, Result};
use crate::git::{GitInfo, GitProbe, Worktree};
use crate::tmux::{ControlPlane, PaneRecord};

/// One recorded control-plane call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCall {
    ListPanes,
    Capture { pane_id: String, lines: usize },
    Resize { pane_id: String, width: u16, height: u16 },
    RestoreSize { pane_id: String },
    SwitchTo { pane_id: String },
    Kill { pane_id: String },
    NewWindow { container: String, path: String, command: String },
    SendLiteral { pane_id: String, text: String },
    SendKey { pane_id: String, name: String },
    CurrentContainer,
}

impl ControlCall {
    pub fn name(&self) -> &'static str {
        match self {
            ControlCall::ListPanes => "list_panes",
            ControlCall::Capture { .. } => "capture_pane",
            ControlCall::Resize { .. } => "resize_window",
            ControlCall::RestoreSize { .. } => "restore_window_size",
            ControlCall::SwitchTo { .. } => "switch_to_pane",
            ControlCall::Kill { .. } => "kill_pane",
            ControlCall::NewWindow { .. } => "new_window",
            ControlCall::SendLiteral { .. } => "send_literal",
            ControlCall::SendKey { .. } => "send_key_name",
            ControlCall::CurrentContainer => "current_container",
        }
    }
}

/// In-memory control plane that records every call in order.
#[derive(Default)]
pub struct MockControlPlane {
    calls: Mutex<Vec<ControlCall>>,
    panes: Mutex<Vec<PaneRecord>>,
    captures: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<&'static str>>,
    next_pane: Mutex<Option<String>>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_panes(panes: Vec<PaneRecord>) -> Self {
        let mock = Self::default();
        mock.set_panes(panes);
        mock
    }

    pub fn set_panes(&self, panes: Vec<PaneRecord>) {
        *lock(&self.panes) = panes;
    }

    pub fn set_capture(&self, pane_id: &str, content: &str) {
        lock(&self.captures).insert(pane_id.to_string(), content.to_string());
    }

    /// Makes the named operation (see [`ControlCall::name`]) fail.
    pub fn fail(&self, operation: &'static str) {
        lock(&self.failing).insert(operation);
    }

    /// Pane id returned by the next `new_window`.
    pub fn set_next_pane(&self, pane_id: &str) {
        *lock(&self.next_pane) = Some(pane_id.to_string());
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, call: ControlCall) -> Result<()> {
        let name = call.name();
        lock(&self.calls).push(call);
        if lock(&self.failing).contains(name) {
            return Err(HerdError::command(name, "mock failure"));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ControlPlane for MockControlPlane {
    fn list_panes(&self) -> Result<Vec<PaneRecord>> {
        self.record(ControlCall::ListPanes)?;
        Ok(lock(&self.panes).clone())
    }

    fn capture_pane(&self, pane_id: &str, scrollback_lines: usize) -> Result<String> {
        self.record(ControlCall::Capture {
            pane_id: pane_id.to_string(),
            lines: scrollback_lines,
        })?;
        Ok(lock(&self.captures).get(pane_id).cloned().unwrap_or_default())
    }

    fn resize_window(&self, pane_id: &str, width: u16, height: u16) -> Result<()> {
        self.record(ControlCall::Resize {
            pane_id: pane_id.to_string(),
            width,
            height,
        })
    }

    fn restore_window_size(&self, pane_id: &str) -> Result<()> {
        self.record(ControlCall::RestoreSize {
            pane_id: pane_id.to_string(),
        })
    }

    fn switch_to_pane(&self, pane_id: &str) -> Result<()> {
        self.record(ControlCall::SwitchTo {
            pane_id: pane_id.to_string(),
        })
    }

    fn kill_pane(&self, pane_id: &str) -> Result<()> {
        self.record(ControlCall::Kill {
            pane_id: pane_id.to_string(),
        })?;
        lock(&self.panes).retain(|p| p.id != pane_id);
        Ok(())
    }

    fn new_window(&self, container: &str, path: &str, command: &str) -> Result<String> {
        self.record(ControlCall::NewWindow {
            container: container.to_string(),
            path: path.to_string(),
            command: command.to_string(),
        })?;
        Ok(lock(&self.next_pane)
            .take()
            .unwrap_or_else(|| "%100".to_string()))
    }

    fn send_literal(&self, pane_id: &str, text: &str) -> Result<()> {
        self.record(ControlCall::SendLiteral {
            pane_id: pane_id.to_string(),
            text: text.to_string(),
        })
    }

    fn send_key_name(&self, pane_id: &str, name: &str) -> Result<()> {
        self.record(ControlCall::SendKey {
            pane_id: pane_id.to_string(),
            name: name.to_string(),
        })
    }

    fn current_container(&self) -> Result<String> {
        self.record(ControlCall::CurrentContainer)?;
        Ok("herd".to_string())
    }
}

/// Git probe answering every directory with the same branch.
#[derive(Debug, Clone, Default)]
pub struct StaticGit {
    pub branch: String,
    pub worktrees: Vec<Worktree>,
}

impl StaticGit {
    pub fn with_branch(branch: &str) -> Self {
        Self {
            branch: branch.to_string(),
            worktrees: Vec::new(),
        }
    }
}

impl GitProbe for StaticGit {
    fn info(&self, dir: &str) -> GitInfo {
        if self.branch.is_empty() {
            return GitInfo::default();
        }
        GitInfo {
            root: dir.to_string(),
            branch: self.branch.clone(),
        }
    }

    fn worktrees(&self, _repo_root: &str) -> Result<Vec<Worktree>> {
        Ok(self.worktrees.clone())
    }
}
