//! Sidebar view model.
//!
//! Turns the ordered session list into the flat row list the sidebar draws
//! and navigates. The session order itself is never changed here.

use std::collections::{BTreeMap, HashMap, HashSet};

use herd_protocol::SessionState;

use crate::ordering::Direction;
use crate::types::Session;

/// Terminal rows taken by a group header.
pub const HEADER_HEIGHT: u16 = 1;
/// Terminal rows taken by a session row (name line plus meta line).
pub const ROW_HEIGHT: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewItem {
    Header {
        group: String,
        count: usize,
        state: SessionState,
        collapsed: bool,
    },
    Row {
        /// Index into the session list.
        index: usize,
        group: Option<String>,
    },
}

impl ViewItem {
    pub fn height(&self) -> u16 {
        match self {
            ViewItem::Header { .. } => HEADER_HEIGHT,
            ViewItem::Row { .. } => ROW_HEIGHT,
        }
    }

    pub fn session_index(&self) -> Option<usize> {
        match self {
            ViewItem::Row { index, .. } => Some(*index),
            ViewItem::Header { .. } => None,
        }
    }
}

/// Builds sidebar rows from `sessions` in order.
///
/// Sessions without an assignment in `groups` (keyed by session key) render
/// as flat rows. The first member of each group emits the group header at
/// its position, followed by every member unless the group is collapsed.
pub fn build_view_items(
    sessions: &[Session],
    groups: &BTreeMap<String, String>,
    collapsed: &HashSet<String>,
) -> Vec<ViewItem> {
    let group_of: Vec<Option<&String>> = sessions
        .iter()
        .map(|s| groups.get(&s.key()).filter(|g| !g.is_empty()))
        .collect();

    let mut members: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, group) in group_of.iter().enumerate() {
        if let Some(group) = group {
            members.entry(group.as_str()).or_default().push(idx);
        }
    }

    let mut emitted: HashSet<&str> = HashSet::new();
    let mut items = Vec::with_capacity(sessions.len());
    for (idx, group) in group_of.iter().enumerate() {
        let Some(group) = group else {
            items.push(ViewItem::Row {
                index: idx,
                group: None,
            });
            continue;
        };
        if !emitted.insert(group.as_str()) {
            continue;
        }

        let indices = &members[group.as_str()];
        let is_collapsed = collapsed.contains(group.as_str());
        items.push(ViewItem::Header {
            group: group.to_string(),
            count: indices.len(),
            state: worst_state(indices.iter().map(|&i| sessions[i].state)),
            collapsed: is_collapsed,
        });
        if !is_collapsed {
            items.extend(indices.iter().map(|&i| ViewItem::Row {
                index: i,
                group: Some(group.to_string()),
            }));
        }
    }
    items
}

/// Flat rows for a filtered list; filtering hides group headers.
pub fn flat_items(indices: &[usize]) -> Vec<ViewItem> {
    indices
        .iter()
        .map(|&index| ViewItem::Row { index, group: None })
        .collect()
}

/// Most severe state, `Unknown` for an empty input.
pub fn worst_state(states: impl IntoIterator<Item = SessionState>) -> SessionState {
    states
        .into_iter()
        .max_by_key(|s| s.severity())
        .unwrap_or(SessionState::Unknown)
}

/// Indices of sessions whose path, branch, pane id, session id or custom
/// name contains `query` (case-insensitive). `None` when the query is blank.
pub fn apply_filter(
    sessions: &[Session],
    names: &BTreeMap<String, String>,
    query: &str,
) -> Option<Vec<usize>> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    Some(
        sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                let name = names.get(&s.key()).map(String::as_str).unwrap_or("");
                format!(
                    "{} {} {} {} {}",
                    s.project_path, s.git_branch, s.pane_id, s.id, name
                )
                .to_lowercase()
                .contains(&query)
            })
            .map(|(i, _)| i)
            .collect(),
    )
}

/// Strips trailing blank lines from captured pane output.
pub fn clean_capture(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}

/// Position of the cursor in `items`: the collapsed header named by
/// `on_group`, otherwise the row for `selected`.
pub fn cursor_position(
    items: &[ViewItem],
    selected: Option<usize>,
    on_group: Option<&str>,
) -> Option<usize> {
    if let Some(on_group) = on_group {
        return items
            .iter()
            .position(|item| matches!(item, ViewItem::Header { group, .. } if group == on_group));
    }
    let selected = selected?;
    items
        .iter()
        .position(|item| item.session_index() == Some(selected))
}

/// Next navigable item from `from` in `direction`.
///
/// Session rows and collapsed headers are navigable; expanded headers are
/// skipped. Without a current position, `Down` starts at the top and `Up`
/// at the bottom.
pub fn step(items: &[ViewItem], from: Option<usize>, direction: Direction) -> Option<&ViewItem> {
    let navigable = |item: &&ViewItem| match item {
        ViewItem::Header { collapsed, .. } => *collapsed,
        ViewItem::Row { .. } => true,
    };
    match direction {
        Direction::Down => {
            let start = from.map_or(0, |p| p + 1);
            items.iter().skip(start).find(navigable)
        }
        Direction::Up => {
            let end = from.unwrap_or(items.len()).min(items.len());
            items[..end].iter().rev().find(navigable)
        }
    }
}

/// First row to draw so the item at `cursor` fits in `visible` rows,
/// scrolling no further than needed.
pub fn scroll_offset(items: &[ViewItem], cursor: usize, visible: u16) -> u16 {
    let top = items
        .iter()
        .take(cursor)
        .fold(0u16, |acc, item| acc.saturating_add(item.height()));
    let bottom = top.saturating_add(items.get(cursor).map_or(0, ViewItem::height));
    bottom.saturating_sub(visible).min(top)
}

/// Item drawn at `row` (0-based, relative to the top of the list).
pub fn item_at_row(items: &[ViewItem], row: u16) -> Option<&ViewItem> {
    let mut top = 0u16;
    for item in items {
        let bottom = top.saturating_add(item.height());
        if row >= top && row < bottom {
            return Some(item);
        }
        top = bottom;
    }
    None
}
