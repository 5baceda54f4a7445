//! State-file protocol types for herd.
//!
//! This crate is shared by the hook writer (`herd hook <event>`) and the
//! dashboard reader so the on-disk schema cannot drift between them. The
//! activity state crosses the boundary as a string; it is parsed into
//! [`SessionState`] here and nowhere else.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Extension of every state file in the sessions directory.
pub const STATE_FILE_EXTENSION: &str = "json";

/// Tool name that signals a plan is waiting for approval.
pub const PLAN_TOOL_NAME: &str = "ExitPlanMode";

/// Activity state of an agent session.
///
/// Unrecognised or missing values map to `Unknown` rather than failing the
/// whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Unknown,
    Idle,
    Working,
    Waiting,
    PlanReady,
    Notifying,
}

impl SessionState {
    pub fn parse(value: &str) -> Self {
        match value {
            "working" => SessionState::Working,
            "waiting" => SessionState::Waiting,
            "idle" => SessionState::Idle,
            "plan_ready" => SessionState::PlanReady,
            "notifying" => SessionState::Notifying,
            _ => SessionState::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Unknown => "unknown",
            SessionState::Idle => "idle",
            SessionState::Working => "working",
            SessionState::Waiting => "waiting",
            SessionState::PlanReady => "plan_ready",
            SessionState::Notifying => "notifying",
        }
    }

    /// Rank used when aggregating a group: Working > Waiting > PlanReady >
    /// Notifying > Idle > Unknown.
    pub fn severity(self) -> u8 {
        match self {
            SessionState::Working => 5,
            SessionState::Waiting => 4,
            SessionState::PlanReady => 3,
            SessionState::Notifying => 2,
            SessionState::Idle => 1,
            SessionState::Unknown => 0,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SessionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SessionState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(SessionState::parse).unwrap_or_default())
    }
}

/// One state file: the latest known state of a single agent session.
///
/// Records are never patched in place; a newer record replaces the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub session_id: String,
    #[serde(default)]
    pub tmux_pane: String,
    #[serde(default)]
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Hook lifecycle events herd registers for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    Stop,
    Notification,
    Other(String),
}

impl HookEvent {
    /// Events written into the agent's settings by `herd install`.
    pub const INSTALLED: [&'static str; 5] = [
        "UserPromptSubmit",
        "PreToolUse",
        "PostToolUse",
        "Stop",
        "Notification",
    ];

    pub fn from_name(name: &str) -> Self {
        match name {
            "UserPromptSubmit" => HookEvent::UserPromptSubmit,
            "PreToolUse" => HookEvent::PreToolUse,
            "PostToolUse" => HookEvent::PostToolUse,
            "Stop" => HookEvent::Stop,
            "Notification" => HookEvent::Notification,
            other => HookEvent::Other(other.to_string()),
        }
    }

    /// State and current tool a session enters when this event fires.
    pub fn transition(&self, tool_name: Option<&str>) -> (SessionState, Option<String>) {
        let tool = tool_name.filter(|t| !t.is_empty()).map(str::to_string);
        match self {
            HookEvent::UserPromptSubmit => (SessionState::Working, None),
            HookEvent::PreToolUse if tool.as_deref() == Some(PLAN_TOOL_NAME) => {
                (SessionState::PlanReady, tool)
            }
            HookEvent::PreToolUse | HookEvent::PostToolUse => (SessionState::Working, tool),
            HookEvent::Stop => (SessionState::Waiting, None),
            HookEvent::Notification => (SessionState::Notifying, tool),
            HookEvent::Other(_) => (SessionState::Unknown, tool),
        }
    }
}

/// JSON object the agent writes to the hook's standard input.
///
/// Only the fields herd uses are declared; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl HookInput {
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}
