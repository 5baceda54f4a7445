//! Session list merging and deterministic ordering.
//!
//! Sort order:
//! 1. pinned sessions, ascending by pin counter
//! 2. unpinned sessions listed in the saved order, by position
//! 3. everything else, in incoming order

use std::collections::{HashMap, HashSet};

use herd_protocol::StateRecord;

use crate::sidebar::SidebarState;
use crate::types::Session;

/// Applies state updates to `sessions`.
///
/// Each session takes the update with its session id if it has one,
/// otherwise the update naming its pane. The matched session's
/// id/state/tool/timestamp are overwritten; every other session is returned
/// unchanged.
pub fn merge_sessions(sessions: &[Session], updates: &[StateRecord]) -> Vec<Session> {
    let mut by_pane: HashMap<&str, &StateRecord> = HashMap::new();
    let mut by_id: HashMap<&str, &StateRecord> = HashMap::new();
    for update in updates {
        if !update.tmux_pane.is_empty() {
            by_pane.insert(update.tmux_pane.as_str(), update);
        }
        if !update.session_id.is_empty() {
            by_id.insert(update.session_id.as_str(), update);
        }
    }

    sessions
        .iter()
        .map(|session| {
            let mut merged = session.clone();
            let matched = (!session.id.is_empty())
                .then(|| by_id.get(session.id.as_str()))
                .flatten()
                .or_else(|| by_pane.get(session.pane_id.as_str()));
            if let Some(update) = matched {
                merged.apply_record(update);
            }
            merged
        })
        .collect()
}

/// Carries hook-owned fields over from the previous list into a fresh
/// discovery result.
///
/// A discovery pass can read the sessions directory just before the hook
/// lands a newer write that the watcher already delivered. The previous
/// values are kept unless the discovered ones are strictly newer. Sessions
/// with an id match by id; fallback sessions match by pane, and never take
/// an id that the discovery result already holds.
pub fn carry_forward(previous: &[Session], discovered: Vec<Session>) -> Vec<Session> {
    let confirmed = || previous.iter().filter(|s| !s.id.is_empty());
    let by_id: HashMap<&str, &Session> = confirmed().map(|s| (s.id.as_str(), s)).collect();
    let by_pane: HashMap<&str, &Session> =
        confirmed().map(|s| (s.pane_id.as_str(), s)).collect();
    let discovered_ids: HashSet<String> = discovered
        .iter()
        .filter(|s| !s.id.is_empty())
        .map(|s| s.id.clone())
        .collect();

    discovered
        .into_iter()
        .map(|mut session| {
            let prev = if session.id.is_empty() {
                by_pane
                    .get(session.pane_id.as_str())
                    .filter(|prev| !discovered_ids.contains(&prev.id))
            } else {
                by_id.get(session.id.as_str())
            };
            if let Some(prev) = prev {
                if prev.updated_at >= session.updated_at {
                    session.id = prev.id.clone();
                    session.state = prev.state;
                    session.current_tool = prev.current_tool.clone();
                    session.updated_at = prev.updated_at;
                }
            }
            session
        })
        .collect()
}

/// Key changes for panes present in both lists, e.g. a fallback session
/// that received its first hook event (`pane:%3` becoming `session:abc`).
/// Only a key that disappeared can move, and only to a key that is new.
pub fn key_changes(previous: &[Session], current: &[Session]) -> Vec<(String, String)> {
    let by_pane: HashMap<&str, &Session> =
        previous.iter().map(|s| (s.pane_id.as_str(), s)).collect();
    let previous_keys = live_keys(previous);
    let current_keys = live_keys(current);
    current
        .iter()
        .filter_map(|session| {
            let prev = by_pane.get(session.pane_id.as_str())?;
            let (old, new) = (prev.key(), session.key());
            (old != new && !current_keys.contains(&old) && !previous_keys.contains(&new))
                .then_some((old, new))
        })
        .collect()
}

pub fn sort_sessions(sessions: &[Session], sidebar: &SidebarState) -> Vec<Session> {
    let order_index: HashMap<&str, usize> = sidebar
        .order
        .iter()
        .enumerate()
        .map(|(i, key)| (key.as_str(), i))
        .collect();

    let (mut pinned, mut unpinned): (Vec<(String, &Session)>, Vec<(String, &Session)>) = sessions
        .iter()
        .map(|s| (s.key(), s))
        .partition(|(key, _)| sidebar.pinned.contains_key(key));

    pinned.sort_by_key(|(key, _)| sidebar.pinned.get(key).copied().unwrap_or(u64::MAX));
    // Stable: keys missing from the saved order keep their relative order
    // after every known key.
    unpinned.sort_by_key(|(key, _)| order_index.get(key.as_str()).copied().unwrap_or(usize::MAX));

    pinned
        .into_iter()
        .chain(unpinned)
        .map(|(_, s)| s.clone())
        .collect()
}

pub fn live_keys(sessions: &[Session]) -> HashSet<String> {
    sessions.iter().map(Session::key).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Swaps the session at `idx` with its neighbour in `direction`.
///
/// Only neighbours of the same kind swap: pinned with pinned (their counters
/// are exchanged) and unpinned with unpinned (the saved order becomes the
/// full current key list). Returns the session's new index.
pub fn move_session(
    sessions: &mut [Session],
    idx: usize,
    direction: Direction,
    sidebar: &mut SidebarState,
) -> Option<usize> {
    let target = match direction {
        Direction::Up => idx.checked_sub(1)?,
        Direction::Down => idx + 1,
    };
    if idx >= sessions.len() || target >= sessions.len() {
        return None;
    }

    let (key, other) = (sessions[idx].key(), sessions[target].key());
    match (sidebar.is_pinned(&key), sidebar.is_pinned(&other)) {
        (true, true) => {
            sidebar.swap_pins(&key, &other);
        }
        (false, false) => {}
        _ => return None,
    }
    sessions.swap(idx, target);
    sidebar.order = sessions.iter().map(Session::key).collect();
    Some(target)
}
