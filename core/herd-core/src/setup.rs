//! Hook registration in the agent's `settings.json`.
//!
//! Herd registers `<herd binary> hook <Event>` for each event in
//! [`HookEvent::INSTALLED`]. Unknown keys in the settings file, and hooks
//! belonging to other tools, are preserved as-is.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fs_err as fs;
use herd_protocol::HookEvent;
use serde::{Deserialize, Serialize};

use crate::error::{HerdError, Result};
use crate::storage::{write_atomic, StorageConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    pub settings_path: PathBuf,
    /// Events that had no herd hook before this install.
    pub added: Vec<&'static str>,
    /// Existing herd hooks whose command was rewritten to the current binary.
    pub updated: usize,
}

impl InstallResult {
    pub fn message(&self) -> String {
        match (self.added.len(), self.updated) {
            (0, 0) => "Hooks already installed".to_string(),
            (0, n) => format!("Hooks updated ({n} rewritten)"),
            (n, _) => format!("Hooks installed for {n} events"),
        }
    }
}

/// Registers herd's hooks for `herd_binary`, writing the settings file
/// atomically.
///
/// Fails without touching the file when it exists but is not valid JSON.
pub fn install_hooks(storage: &StorageConfig, herd_binary: &str) -> Result<InstallResult> {
    let settings_path = storage.claude_settings_file();
    let mut settings = read_settings(&settings_path)?;
    let hooks = settings.hooks.get_or_insert_with(HashMap::new);

    let mut added = Vec::new();
    let mut updated = 0;
    for event in HookEvent::INSTALLED {
        let command = hook_command(herd_binary, event);
        let rules = hooks.entry(event.to_string()).or_default();

        let mut present = false;
        for rule in rules.iter_mut() {
            for inner in rule.hooks.iter_mut().flatten() {
                let Some(existing) = inner.command.as_deref() else {
                    continue;
                };
                if !is_herd_hook_command(existing, event) {
                    continue;
                }
                present = true;
                if existing != command {
                    inner.command = Some(command.clone());
                    updated += 1;
                }
            }
        }

        if !present {
            rules.push(HookRule {
                matcher: None,
                hooks: Some(vec![InnerHook {
                    hook_type: Some("command".to_string()),
                    command: Some(command),
                    other: HashMap::new(),
                }]),
                other: HashMap::new(),
            });
            added.push(event);
        }
    }

    let content = serde_json::to_string_pretty(&settings)
        .map_err(|e| HerdError::json("serialize settings", e))?;
    write_atomic(&settings_path, content.as_bytes())?;

    tracing::info!(
        path = %settings_path.display(),
        added = added.len(),
        updated,
        "Hooks registered"
    );
    Ok(InstallResult {
        settings_path,
        added,
        updated,
    })
}

/// Whether every installed event already has a herd hook.
pub fn hooks_installed(storage: &StorageConfig) -> bool {
    let Ok(settings) = read_settings(&storage.claude_settings_file()) else {
        return false;
    };
    let Some(hooks) = settings.hooks else {
        return false;
    };
    HookEvent::INSTALLED.iter().all(|event| {
        hooks.get(*event).is_some_and(|rules| {
            rules
                .iter()
                .flat_map(|rule| rule.hooks.iter().flatten())
                .filter_map(|inner| inner.command.as_deref())
                .any(|cmd| is_herd_hook_command(cmd, event))
        })
    })
}

pub fn hook_command(herd_binary: &str, event: &str) -> String {
    format!("{herd_binary} hook {event}")
}

/// Matches `<path>/herd hook <event>` regardless of where the binary lives.
fn is_herd_hook_command(command: &str, event: &str) -> bool {
    let mut parts = command.split_whitespace();
    let (Some(binary), Some("hook"), Some(name), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    name == event && Path::new(binary).file_name().is_some_and(|f| f == "herd")
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SettingsFile::default()),
        Err(e) => return Err(HerdError::io(format!("read {}", path.display()), e)),
    };
    if content.trim().is_empty() {
        return Ok(SettingsFile::default());
    }
    serde_json::from_str(&content).map_err(|e| HerdError::SettingsMalformed {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    hooks: Option<HashMap<String, Vec<HookRule>>>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HookRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    matcher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hooks: Option<Vec<InnerHook>>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InnerHook {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    hook_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_env() -> (TempDir, StorageConfig) {
        let temp = TempDir::new().unwrap();
        let storage =
            StorageConfig::with_roots(temp.path().join(".herd"), temp.path().join(".claude"));
        (temp, storage)
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_install_registers_all_events() {
        let (_temp, storage) = setup_test_env();
        assert!(!hooks_installed(&storage));

        let result = install_hooks(&storage, "/usr/local/bin/herd").unwrap();
        assert_eq!(result.added.len(), HookEvent::INSTALLED.len());
        assert!(hooks_installed(&storage));

        let json = read_json(&storage.claude_settings_file());
        assert_eq!(
            json["hooks"]["Stop"][0]["hooks"][0]["command"],
            "/usr/local/bin/herd hook Stop"
        );
        assert_eq!(json["hooks"]["Stop"][0]["hooks"][0]["type"], "command");
        assert!(json["hooks"]["Stop"][0].get("matcher").is_none());
    }

    #[test]
    fn test_install_is_idempotent() {
        let (_temp, storage) = setup_test_env();
        install_hooks(&storage, "/bin/herd").unwrap();
        let second = install_hooks(&storage, "/bin/herd").unwrap();
        assert!(second.added.is_empty());
        assert_eq!(second.updated, 0);

        let json = read_json(&storage.claude_settings_file());
        assert_eq!(json["hooks"]["PreToolUse"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_install_rewrites_moved_binary() {
        let (_temp, storage) = setup_test_env();
        install_hooks(&storage, "/old/herd").unwrap();
        let result = install_hooks(&storage, "/new/herd").unwrap();
        assert_eq!(result.updated, HookEvent::INSTALLED.len());

        let json = read_json(&storage.claude_settings_file());
        assert_eq!(
            json["hooks"]["Notification"][0]["hooks"][0]["command"],
            "/new/herd hook Notification"
        );
    }

    #[test]
    fn test_install_preserves_other_settings_and_hooks() {
        let (_temp, storage) = setup_test_env();
        let path = storage.claude_settings_file();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"model":"opus","hooks":{"Stop":[{"matcher":"*","hooks":[{"type":"command","command":"notify-send done","timeout":5}]}]}}"#,
        )
        .unwrap();

        install_hooks(&storage, "/bin/herd").unwrap();
        let json = read_json(&path);
        assert_eq!(json["model"], "opus");
        let stop = json["hooks"]["Stop"].as_array().unwrap();
        assert_eq!(stop.len(), 2);
        assert_eq!(stop[0]["hooks"][0]["command"], "notify-send done");
        assert_eq!(stop[0]["hooks"][0]["timeout"], 5);
        assert_eq!(stop[1]["hooks"][0]["command"], "/bin/herd hook Stop");
    }

    #[test]
    fn test_install_refuses_corrupt_settings() {
        let (_temp, storage) = setup_test_env();
        let path = storage.claude_settings_file();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let err = install_hooks(&storage, "/bin/herd").unwrap_err();
        assert!(matches!(err, HerdError::SettingsMalformed { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_herd_command_detection() {
        assert!(is_herd_hook_command("/a/b/herd hook Stop", "Stop"));
        assert!(is_herd_hook_command("herd hook Stop", "Stop"));
        assert!(!is_herd_hook_command("/a/b/herd hook Stop", "PreToolUse"));
        assert!(!is_herd_hook_command("/a/b/herdsman hook Stop", "Stop"));
        assert!(!is_herd_hook_command("/a/b/herd hook Stop --x", "Stop"));
    }
}
