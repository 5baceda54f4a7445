//! Messages consumed by [`super::App::update`] and the commands it returns.

use std::fmt;
use std::time::Duration;

use crossterm::event::{KeyEvent, MouseEvent};
use herd_core::{Session, Worktree};
use herd_protocol::StateRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Fast timer: re-fetch the observed pane.
    Capture,
    /// Slow timer: full rediscovery.
    Refresh,
    /// One-shot discovery after a launch whose pane was not yet visible.
    QuickRetry,
}

/// User-initiated background actions whose failure is shown on the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Jump,
    Kill,
    Launch,
    SendKeys,
    Feedback,
    InstallHooks,
    ListWorktrees,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Jump => "jump",
            Action::Kill => "kill",
            Action::Launch => "launch",
            Action::SendKeys => "send keys",
            Action::Feedback => "send feedback",
            Action::InstallHooks => "install hooks",
            Action::ListWorktrees => "list worktrees",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub enum Msg {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize { width: u16, height: u16 },
    Tick(Tick),
    Discovered(Vec<Session>),
    DiscoveryFailed(String),
    Captured { pane_id: String, content: String },
    StateChanged(StateRecord),
    WatcherError(String),
    WatcherClosed,
    Launched { pane_id: String },
    Killed { pane_id: String },
    Notice(String),
    ProjectsScanned(Vec<String>),
    WorktreesListed { repo_root: String, worktrees: Vec<Worktree> },
    ActionFailed { action: Action, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    Schedule { tick: Tick, after: Duration },
    Discover,
    Capture { pane_id: String },
    Resize { pane_id: String, width: u16, height: u16 },
    RestoreSize { pane_id: String },
    SwitchTo { pane_id: String },
    Kill { pane_id: String },
    Launch { path: String },
    SendLiteral { pane_id: String, text: String },
    SendKey { pane_id: String, name: String },
    /// Types `text` into the pane and presses Enter.
    SendFeedback { pane_id: String, text: String },
    InstallHooks,
    ScanProjects { existing: Vec<String> },
    ListWorktrees { repo_root: String },
}

impl Cmd {
    /// Commands that type into a pane and must reach it in issue order.
    pub fn is_key_forward(&self) -> bool {
        matches!(self, Cmd::SendLiteral { .. } | Cmd::SendKey { .. })
    }
}
