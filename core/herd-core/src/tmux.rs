//! tmux control plane.
//!
//! [`ControlPlane`] is the set of pane operations the dashboard relies on;
//! [`TmuxClient`] implements it by shelling out to `tmux`. Tests use
//! `testing::MockControlPlane` instead.

use std::process::Command;

use crate::error::{HerdError, Result};

/// One row of `tmux list-panes -a`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaneRecord {
    pub id: String,
    /// tmux session name containing the pane.
    pub container: String,
    pub window_index: u32,
    pub pane_index: u32,
    pub current_command: String,
    pub current_path: String,
    pub width: u16,
    pub height: u16,
}

pub trait ControlPlane: Send + Sync {
    fn list_panes(&self) -> Result<Vec<PaneRecord>>;
    fn capture_pane(&self, pane_id: &str, scrollback_lines: usize) -> Result<String>;
    /// Pins the window holding `pane_id` to an explicit size.
    fn resize_window(&self, pane_id: &str, width: u16, height: u16) -> Result<()>;
    /// Returns the window holding `pane_id` to tmux's automatic sizing.
    fn restore_window_size(&self, pane_id: &str) -> Result<()>;
    fn switch_to_pane(&self, pane_id: &str) -> Result<()>;
    fn kill_pane(&self, pane_id: &str) -> Result<()>;
    /// Opens a detached window in `container` at `path`, types `command`
    /// into it and returns the new pane id.
    fn new_window(&self, container: &str, path: &str, command: &str) -> Result<String>;
    fn send_literal(&self, pane_id: &str, text: &str) -> Result<()>;
    /// Sends a named key such as `Enter`, `BSpace` or `C-c`.
    fn send_key_name(&self, pane_id: &str, name: &str) -> Result<()>;
    /// Name of the tmux session the dashboard itself runs in.
    fn current_container(&self) -> Result<String>;
}

/// Whether a pane's foreground command looks like the agent.
///
/// This is a heuristic on the process name only: an exact `claude`
/// (any case), or a bare `N.N.N` version string, which is how the agent's
/// node process shows up in `pane_current_command`. Any unrelated process
/// named like a version number is a false positive.
pub fn is_agent_pane(current_command: &str) -> bool {
    current_command.eq_ignore_ascii_case("claude") || is_version_string(current_command)
}

fn is_version_string(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

const LIST_FORMAT: &str = "#{pane_id}\t#{session_name}\t#{window_index}\t#{pane_index}\t#{pane_current_command}\t#{pane_current_path}\t#{pane_width}\t#{pane_height}";

pub fn parse_pane_line(line: &str) -> Option<PaneRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 8 || fields[0].trim().is_empty() {
        return None;
    }
    let number = |value: &str| value.trim().parse().unwrap_or_default();
    Some(PaneRecord {
        id: fields[0].trim().to_string(),
        container: fields[1].to_string(),
        window_index: number(fields[2]),
        pane_index: number(fields[3]),
        current_command: fields[4].to_string(),
        current_path: fields[5].to_string(),
        width: fields[6].trim().parse().unwrap_or_default(),
        height: fields[7].trim().parse().unwrap_or_default(),
    })
}

pub fn parse_pane_list(output: &str) -> Vec<PaneRecord> {
    output.lines().filter_map(parse_pane_line).collect()
}

#[derive(Debug, Clone, Default)]
pub struct TmuxClient;

impl TmuxClient {
    pub fn new() -> Self {
        Self
    }
}

impl ControlPlane for TmuxClient {
    fn list_panes(&self) -> Result<Vec<PaneRecord>> {
        let output = run_tmux(&["list-panes", "-a", "-F", LIST_FORMAT])?;
        Ok(parse_pane_list(&output))
    }

    fn capture_pane(&self, pane_id: &str, scrollback_lines: usize) -> Result<String> {
        let start = format!("-{scrollback_lines}");
        run_tmux(&["capture-pane", "-p", "-t", pane_id, "-S", &start])
    }

    fn resize_window(&self, pane_id: &str, width: u16, height: u16) -> Result<()> {
        let (width, height) = (width.to_string(), height.to_string());
        run_tmux(&["resize-window", "-t", pane_id, "-x", &width, "-y", &height]).map(drop)
    }

    fn restore_window_size(&self, pane_id: &str) -> Result<()> {
        run_tmux(&["resize-window", "-A", "-t", pane_id]).map(drop)
    }

    fn switch_to_pane(&self, pane_id: &str) -> Result<()> {
        run_tmux(&["select-window", "-t", pane_id])?;
        run_tmux(&["select-pane", "-t", pane_id])?;
        let container = run_tmux(&["display-message", "-t", pane_id, "-p", "#{session_name}"])?;
        run_tmux(&["switch-client", "-t", container.trim()]).map(drop)
    }

    fn kill_pane(&self, pane_id: &str) -> Result<()> {
        run_tmux(&["kill-pane", "-t", pane_id]).map(drop)
    }

    fn new_window(&self, container: &str, path: &str, command: &str) -> Result<String> {
        // Trailing colon targets "next window in this session".
        let target = format!("{container}:");
        let output = run_tmux(&[
            "new-window", "-d", "-t", &target, "-c", path, "-P", "-F", "#{pane_id}",
        ])?;
        let pane_id = output.trim().to_string();
        if pane_id.is_empty() {
            return Err(HerdError::command("tmux new-window", "no pane id returned"));
        }
        self.send_literal(&pane_id, command)?;
        self.send_key_name(&pane_id, "Enter")?;
        Ok(pane_id)
    }

    fn send_literal(&self, pane_id: &str, text: &str) -> Result<()> {
        run_tmux(&["send-keys", "-t", pane_id, "-l", text]).map(drop)
    }

    fn send_key_name(&self, pane_id: &str, name: &str) -> Result<()> {
        run_tmux(&["send-keys", "-t", pane_id, name]).map(drop)
    }

    fn current_container(&self) -> Result<String> {
        let pane = std::env::var("TMUX_PANE")
            .ok()
            .filter(|p| !p.is_empty())
            .ok_or(HerdError::NotInTmux)?;
        let output = run_tmux(&["display-message", "-t", &pane, "-p", "#{session_name}"])?;
        Ok(output.trim().to_string())
    }
}

fn run_tmux(args: &[&str]) -> Result<String> {
    let command = format!("tmux {}", args.first().copied().unwrap_or_default());
    let output = Command::new("tmux")
        .args(args)
        .output()
        .map_err(|e| HerdError::command(&command, e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(HerdError::command(command, stderr));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
