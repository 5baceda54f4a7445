//! Core session type shown in the dashboard.

use chrono::{DateTime, Utc};
use herd_protocol::{SessionState, StateRecord};

/// One monitored agent session.
///
/// A session is either hook-confirmed (it has an `id` from a state record) or
/// a heuristic fallback found by looking at pane commands (empty `id`,
/// `Unknown` state, no timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    /// Session id issued by the agent's hooks; empty until the first hook fires.
    pub id: String,
    /// tmux pane id, e.g. `%12`. Volatile across tmux restarts.
    pub pane_id: String,
    /// Name of the tmux session containing the pane.
    pub container: String,
    pub window_index: u32,
    pub pane_index: u32,
    pub project_path: String,
    pub git_root: String,
    pub git_branch: String,
    pub state: SessionState,
    pub current_tool: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Identity used for pinning, ordering and grouping.
    ///
    /// Falls back to the pane id so a session keeps an identity between pane
    /// creation and its first hook event.
    pub fn key(&self) -> String {
        session_key(&self.id, &self.pane_id)
    }

    /// Last two components of the project path, e.g. `dev/herd`.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = self
            .project_path
            .split('/')
            .filter(|part| !part.is_empty())
            .collect();
        match parts.as_slice() {
            [] => self.pane_id.clone(),
            [only] => (*only).to_string(),
            [.., parent, name] => format!("{parent}/{name}"),
        }
    }

    /// Overwrites the hook-owned fields from a state record.
    pub fn apply_record(&mut self, record: &StateRecord) {
        self.id = record.session_id.clone();
        self.state = record.state;
        self.current_tool = record.current_tool.clone();
        self.updated_at = Some(record.updated_at);
    }
}

pub fn session_key(id: &str, pane_id: &str) -> String {
    if id.is_empty() {
        format!("pane:{pane_id}")
    } else {
        format!("session:{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, pane: &str, path: &str) -> Session {
        Session {
            id: id.to_string(),
            pane_id: pane.to_string(),
            project_path: path.to_string(),
            ..Session::default()
        }
    }

    #[test]
    fn key_prefers_session_id() {
        assert_eq!(session("abc", "%1", "").key(), "session:abc");
        assert_eq!(session("", "%1", "").key(), "pane:%1");
    }

    #[test]
    fn display_name_uses_last_two_components() {
        assert_eq!(session("", "%1", "/home/u/dev/herd").display_name(), "dev/herd");
        assert_eq!(session("", "%1", "/herd/").display_name(), "herd");
        assert_eq!(session("", "%1", "").display_name(), "%1");
    }
}
