//! File logging.
//!
//! The dashboard owns the terminal and the hook must stay silent, so every
//! subcommand logs to `<herd root>/logs/herd.log`.

use std::env;
use std::path::Path;

use herd_core::StorageConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Forces debug-level logging when set to a truthy value.
pub const DEBUG_ENV: &str = "HERD_DEBUG_LOG";

const LOG_FILE: &str = "herd.log";

/// Installs the global subscriber. The returned guard flushes buffered lines
/// on drop and must be held for the life of the process. Returns `None`, with
/// logging disabled, when the log file cannot be opened.
pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let appender = file_appender(&storage.logs_dir())?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

fn file_appender(dir: &Path) -> Option<RollingFileAppender> {
    fs_err::create_dir_all(dir).ok()?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(dir)
        .ok()
}

fn filter() -> EnvFilter {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_appender_writes_herd_log() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs");
        let mut appender = file_appender(&dir).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();
        assert_eq!(std::fs::read_to_string(dir.join(LOG_FILE)).unwrap(), "hello\n");
    }

    #[test]
    fn test_unopenable_log_file_disables_logging() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs");
        std::fs::create_dir_all(dir.join(LOG_FILE)).unwrap();
        assert!(file_appender(&dir).is_none());
    }

    #[test]
    fn test_hook_records_state_when_log_file_is_unopenable() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().join(".herd"));
        std::fs::create_dir_all(storage.logs_dir().join(LOG_FILE)).unwrap();

        assert!(init(&storage).is_none());

        let store = herd_core::StateStore::new(storage.sessions_dir());
        let written = crate::hook::handle(
            "Stop",
            r#"{"session_id":"s1","cwd":"/tmp"}"#,
            Some("%1".to_string()),
            None,
            &store,
            chrono::Utc::now(),
        )
        .unwrap();
        assert!(written.is_some());
        assert_eq!(store.read_all().unwrap().len(), 1);
    }
}
