//! Session discovery: reconciles state records with the live pane inventory.
//!
//! ```text
//! records ──┐
//!           ├─► hook-confirmed sessions (record's pane is live), record order
//! panes ────┤
//!           └─► fallback sessions (uncovered panes that look like the agent), pane order
//! ```
//!
//! A record whose pane is gone is stale and dropped, whatever it says.
//! Fallback sessions carry no id, `Unknown` state and no timestamp, so two
//! passes over the same inputs produce identical output.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use herd_protocol::{SessionState, StateRecord};

use crate::error::Result;
use crate::git::{GitCache, GitProbe};
use crate::state::StateStore;
use crate::tmux::{is_agent_pane, ControlPlane, PaneRecord};
use crate::types::Session;

pub fn discover(records: &[StateRecord], panes: &[PaneRecord], git: &dyn GitProbe) -> Vec<Session> {
    let live: HashMap<&str, &PaneRecord> = panes.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut covered: HashSet<&str> = HashSet::new();
    let mut git = GitCache::new(git);
    let mut sessions = Vec::new();

    for record in records {
        let Some(pane) = live.get(record.tmux_pane.as_str()) else {
            continue;
        };
        covered.insert(pane.id.as_str());
        let project_path = record
            .project_path
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| pane.current_path.clone());
        let info = git.lookup(&project_path);
        sessions.push(Session {
            id: record.session_id.clone(),
            pane_id: pane.id.clone(),
            container: pane.container.clone(),
            window_index: pane.window_index,
            pane_index: pane.pane_index,
            project_path,
            git_root: info.root,
            git_branch: info.branch,
            state: record.state,
            current_tool: record.current_tool.clone(),
            updated_at: Some(record.updated_at),
        });
    }

    for pane in panes {
        if covered.contains(pane.id.as_str()) || !is_agent_pane(&pane.current_command) {
            continue;
        }
        let info = git.lookup(&pane.current_path);
        sessions.push(Session {
            id: String::new(),
            pane_id: pane.id.clone(),
            container: pane.container.clone(),
            window_index: pane.window_index,
            pane_index: pane.pane_index,
            project_path: pane.current_path.clone(),
            git_root: info.root,
            git_branch: info.branch,
            state: SessionState::Unknown,
            current_tool: None,
            updated_at: None,
        });
    }

    sessions
}

/// Runs a full discovery pass against the real sources.
#[derive(Clone)]
pub struct Discovery {
    store: StateStore,
    control: Arc<dyn ControlPlane>,
    git: Arc<dyn GitProbe>,
}

impl Discovery {
    pub fn new(store: StateStore, control: Arc<dyn ControlPlane>, git: Arc<dyn GitProbe>) -> Self {
        Self {
            store,
            control,
            git,
        }
    }

    /// Fails when either the state directory or the pane inventory cannot be
    /// read; the caller decides whether to keep showing stale data.
    pub fn run(&self) -> Result<Vec<Session>> {
        let records = self.store.read_all()?;
        let panes = self.control.list_panes()?;
        let sessions = discover(&records, &panes, self.git.as_ref());
        tracing::debug!(
            records = records.len(),
            panes = panes.len(),
            sessions = sessions.len(),
            "Discovery pass complete"
        );
        Ok(sessions)
    }
}
