//! Filesystem watch over the sessions directory.
//!
//! Turns notify events into one ordered stream of [`StateRecord`]s. On every
//! create/modify of a `.json` file the whole directory is re-read and the
//! record owning that file is emitted; event volume is low, so a full read
//! is cheaper to get right than diffing event payloads.
//!
//! Both outgoing channels are bounded. When a consumer falls behind, the
//! newest item is dropped instead of blocking the watcher; the periodic
//! rediscovery pass resynchronises anything missed.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fs_err as fs;
use herd_protocol::StateRecord;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::store::{is_state_file, StateStore};
use crate::error::{HerdError, Result};

pub const EVENT_BUFFER: usize = 16;
pub const ERROR_BUFFER: usize = 4;

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Receiving ends handed to the consumer.
///
/// Both report disconnection once the watcher is closed.
pub struct WatchStreams {
    pub events: Receiver<StateRecord>,
    pub errors: Receiver<String>,
}

pub struct StateWatcher {
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl StateWatcher {
    pub fn start(store: StateStore) -> Result<(Self, WatchStreams)> {
        fs::create_dir_all(store.dir())
            .map_err(|e| HerdError::io("create state directory", e))?;

        let (raw_tx, raw_rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = raw_tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(store.dir(), RecursiveMode::NonRecursive)?;

        let (event_tx, event_rx) = mpsc::sync_channel(EVENT_BUFFER);
        let (error_tx, error_rx) = mpsc::sync_channel(ERROR_BUFFER);
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);

        let worker = thread::Builder::new()
            .name("herd-state-watch".to_string())
            .spawn(move || pump(&store, &raw_rx, &event_tx, &error_tx, &worker_stop))
            .map_err(|e| HerdError::io("spawn state watcher", e))?;

        tracing::debug!("State watcher started");
        Ok((
            Self {
                watcher: Some(watcher),
                worker: Some(worker),
                stop,
            },
            WatchStreams {
                events: event_rx,
                errors: error_rx,
            },
        ))
    }

    /// Stops watching. The consumer's receivers observe disconnection once
    /// the worker has exited; calling this again is a no-op.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.watcher.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            tracing::debug!("State watcher stopped");
        }
    }
}

impl Drop for StateWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn pump(
    store: &StateStore,
    raw: &Receiver<notify::Result<Event>>,
    events: &SyncSender<StateRecord>,
    errors: &SyncSender<String>,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::SeqCst) {
        let received = match raw.recv_timeout(SHUTDOWN_POLL) {
            Ok(received) => received,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        };

        match received {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    continue;
                }
                for path in event.paths.iter().filter(|p| is_state_file(p)) {
                    let Some(record) = record_for_path(store, path, errors) else {
                        continue;
                    };
                    if !offer(events, record) {
                        return;
                    }
                }
            }
            Err(e) => {
                if !offer(errors, e.to_string()) {
                    return;
                }
            }
        }
    }
}

fn record_for_path(
    store: &StateStore,
    path: &Path,
    errors: &SyncSender<String>,
) -> Option<StateRecord> {
    let records = match store.read_all_with_paths() {
        Ok(records) => records,
        Err(e) => {
            offer(errors, e.to_string());
            return None;
        }
    };
    let file_name = path.file_name()?;
    records
        .into_iter()
        .find(|(_, record)| {
            store
                .path_for(&record.session_id)
                .ok()
                .and_then(|own| own.file_name().map(|n| n == file_name))
                .unwrap_or(false)
        })
        .map(|(_, record)| record)
}

/// Non-blocking send that drops `item` when the channel is full. Returns
/// false once the receiver is gone.
pub(crate) fn offer<T>(tx: &SyncSender<T>, item: T) -> bool {
    match tx.try_send(item) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::debug!("Watch channel full, dropping newest item");
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herd_protocol::SessionState;
    use tempfile::TempDir;

    fn record(id: &str, state: SessionState) -> StateRecord {
        StateRecord {
            session_id: id.to_string(),
            tmux_pane: "%1".to_string(),
            state,
            current_tool: None,
            project_path: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_offer_drops_newest_when_full() {
        let (tx, rx) = mpsc::sync_channel(1);
        assert!(offer(&tx, 1));
        assert!(offer(&tx, 2));
        assert_eq!(rx.try_recv(), Ok(1));
        assert!(rx.try_recv().is_err());
        drop(rx);
        assert!(!offer(&tx, 3));
    }

    #[test]
    fn test_emits_written_record() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().join("sessions"));
        let (mut watcher, streams) = StateWatcher::start(store.clone()).unwrap();

        let written = record("abc", SessionState::Waiting);
        store.write(&written).unwrap();

        let got = streams
            .events
            .recv_timeout(Duration::from_secs(5))
            .expect("record from watcher");
        assert_eq!(got.session_id, "abc");
        assert_eq!(got.state, SessionState::Waiting);
        watcher.close();
    }

    #[test]
    fn test_ignores_non_state_files() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        let (mut watcher, streams) = StateWatcher::start(store).unwrap();

        std::fs::write(temp.path().join("notes.txt"), "hi").unwrap();
        assert!(streams
            .events
            .recv_timeout(Duration::from_millis(300))
            .is_err());
        watcher.close();
    }

    #[test]
    fn test_close_disconnects_consumer_once() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path().to_path_buf());
        let (mut watcher, streams) = StateWatcher::start(store).unwrap();

        watcher.close();
        watcher.close();

        let mut disconnects = 0;
        loop {
            match streams.events.recv_timeout(Duration::from_secs(5)) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    disconnects += 1;
                    break;
                }
                Err(RecvTimeoutError::Timeout) => panic!("watcher did not shut down"),
            }
        }
        assert_eq!(disconnects, 1);
        assert!(matches!(
            streams.errors.recv_timeout(Duration::from_secs(1)),
            Err(RecvTimeoutError::Disconnected)
        ));
    }
}
