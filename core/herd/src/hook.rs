//! `herd hook <EVENT>`: records one agent lifecycle event as a state file.
//!
//! Called by the agent itself, so nothing here may write to stdout or stderr.

use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use herd_core::{HerdError, Result, StateStore, StorageConfig};
use herd_protocol::{HookEvent, HookInput, StateRecord};

pub fn run(storage: &StorageConfig, event: &str) -> Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| HerdError::io("read hook input", e))?;

    let pane = env::var("TMUX_PANE").ok().filter(|p| !p.is_empty());
    let cwd = env::current_dir().ok();
    let store = StateStore::new(storage.sessions_dir());
    handle(event, &input, pane, cwd.as_deref(), &store, Utc::now())?;
    Ok(())
}

/// Writes the record for one event. Returns the file written, or `None`
/// when the input carries nothing to record.
pub fn handle(
    event: &str,
    input: &str,
    pane: Option<String>,
    process_cwd: Option<&Path>,
    store: &StateStore,
    now: DateTime<Utc>,
) -> Result<Option<PathBuf>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    let hook_input: HookInput =
        serde_json::from_str(input).map_err(|e| HerdError::json("parse hook input", e))?;

    let Some(session_id) = hook_input.session_id().map(str::to_string) else {
        tracing::debug!(event, "Skipping event (missing session_id)");
        return Ok(None);
    };

    let (state, current_tool) =
        HookEvent::from_name(event).transition(hook_input.tool_name.as_deref());
    let project_path = hook_input
        .cwd
        .filter(|cwd| !cwd.trim().is_empty())
        .or_else(|| process_cwd.map(|p| p.to_string_lossy().into_owned()));

    let record = StateRecord {
        session_id,
        tmux_pane: pane.unwrap_or_default(),
        state,
        current_tool,
        project_path,
        updated_at: now,
    };
    let path = store.write(&record)?;
    tracing::debug!(
        event,
        session = %record.session_id,
        pane = %record.tmux_pane,
        state = record.state.as_str(),
        "Recorded hook event"
    );
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use herd_protocol::SessionState;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).unwrap()
    }

    fn record_for(event: &str, input: &str) -> (TempDir, Option<StateRecord>) {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().join("sessions"));
        handle(
            event,
            input,
            Some("%4".to_string()),
            Some(Path::new("/from/process")),
            &store,
            now(),
        )
        .unwrap();
        let record = store.read_all().unwrap().into_iter().next();
        (temp, record)
    }

    #[test]
    fn test_prompt_submit_marks_working() {
        let (_temp, record) = record_for(
            "UserPromptSubmit",
            r#"{"session_id":"s1","cwd":"/work/api","prompt":"hi"}"#,
        );
        let record = record.unwrap();
        assert_eq!(record.state, SessionState::Working);
        assert_eq!(record.tmux_pane, "%4");
        assert_eq!(record.project_path.as_deref(), Some("/work/api"));
        assert_eq!(record.current_tool, None);
        assert_eq!(record.updated_at, now());
    }

    #[test]
    fn test_plan_tool_marks_plan_ready() {
        let (_temp, record) = record_for(
            "PreToolUse",
            r#"{"session_id":"s1","tool_name":"ExitPlanMode"}"#,
        );
        assert_eq!(record.unwrap().state, SessionState::PlanReady);

        let (_temp, record) = record_for("PreToolUse", r#"{"session_id":"s1","tool_name":"Bash"}"#);
        let record = record.unwrap();
        assert_eq!(record.state, SessionState::Working);
        assert_eq!(record.current_tool.as_deref(), Some("Bash"));
    }

    #[test]
    fn test_stop_and_notification() {
        let (_temp, record) = record_for("Stop", r#"{"session_id":"s1","tool_name":"Bash"}"#);
        let record = record.unwrap();
        assert_eq!(record.state, SessionState::Waiting);
        assert_eq!(record.current_tool, None);

        let (_temp, record) = record_for(
            "Notification",
            r#"{"session_id":"s1","message":"needs permission"}"#,
        );
        assert_eq!(record.unwrap().state, SessionState::Notifying);

        let (_temp, record) = record_for("SessionEnd", r#"{"session_id":"s1"}"#);
        assert_eq!(record.unwrap().state, SessionState::Unknown);
    }

    #[test]
    fn test_falls_back_to_process_cwd() {
        let (_temp, record) = record_for("Stop", r#"{"session_id":"s1","cwd":""}"#);
        assert_eq!(record.unwrap().project_path.as_deref(), Some("/from/process"));
    }

    #[test]
    fn test_nothing_to_record() {
        let (_temp, record) = record_for("Stop", "  \n");
        assert!(record.is_none());
        let (_temp, record) = record_for("Stop", r#"{"cwd":"/x"}"#);
        assert!(record.is_none());
        let (_temp, record) = record_for("Stop", r#"{"session_id":"  "}"#);
        assert!(record.is_none());
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().join("sessions"));
        assert!(handle("Stop", "{not json", None, None, &store, now()).is_err());
        assert!(store.read_all().unwrap().is_empty());
    }
}
