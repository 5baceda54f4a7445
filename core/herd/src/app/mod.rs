//! Dashboard orchestrator.
//!
//! [`App`] owns the session list and all UI state. It is driven one message
//! at a time through [`App::update`], which mutates state and returns the
//! commands the runtime should execute off-thread. Nothing else mutates the
//! session list.
//!
//! ## Modes
//!
//! ```text
//! Normal ──/──► Filter       Normal ──n──► Picker     Normal ──d──► Review
//!        ──R──► Rename              ──g──► GroupAssign       ──w──► Worktree
//! ```
//!
//! Non-normal modes intercept only key, mouse and resize messages. Timers,
//! discovery results and watcher events always reach the normal handler, so
//! polling continues while a modal view is open. Leaving a mode invalidates
//! the cached capture and re-arms any idle timer.

pub mod keys;
pub mod msg;
pub mod overlay;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use herd_core::ordering::Direction;
use herd_core::view::{cursor_position, flat_items, item_at_row, scroll_offset, step};
use herd_core::{
    apply_filter, build_view_items, carry_forward, clean_capture, key_changes, live_keys,
    merge_sessions, move_session, sort_sessions, Config, KvStore, Session, SidebarStore,
    StorageConfig, ViewItem,
};
use herd_protocol::StateRecord;

use self::keys::Forward;
pub use self::msg::{Action, Cmd, Msg, Tick};
use self::overlay::{Outcome, Picker, Prompt, WorktreeList};

/// Top bar with the title and selected project.
pub const HEADER_ROWS: u16 = 1;
/// State line above the output view.
pub const OUTPUT_HEADER_ROWS: u16 = 1;
/// Help/status line at the bottom.
pub const FOOTER_ROWS: u16 = 1;

const MIN_VIEWPORT_WIDTH: u16 = 10;
const MIN_VIEWPORT_HEIGHT: u16 = 3;
const SCROLL_STEP: usize = 3;
const NOTICE_TTL: Duration = Duration::from_secs(2);
const ERROR_TTL: Duration = Duration::from_secs(3);
const HINT_TTL: Duration = Duration::from_secs(10);

/// Persisted per-session stores, all write-through.
pub struct Stores {
    pub sidebar: SidebarStore,
    pub names: KvStore,
    pub groups: KvStore,
}

impl Stores {
    pub fn load(storage: &StorageConfig) -> Self {
        Self {
            sidebar: SidebarStore::load(&storage.sidebar_file()),
            names: KvStore::load(&storage.names_file()),
            groups: KvStore::load(&storage.groups_file()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum Mode {
    #[default]
    Normal,
    Filter(Prompt),
    Rename { key: String, prompt: Prompt },
    GroupAssign { key: String, prompt: Prompt },
    Picker(Picker),
    Review { pane_id: String, prompt: Prompt },
    Worktree(WorktreeList),
}

impl Mode {
    pub fn is_normal(&self) -> bool {
        matches!(self, Mode::Normal)
    }
}

pub struct App {
    pub sessions: Vec<Session>,
    pub selected: usize,
    /// Set while the cursor rests on a collapsed group header.
    pub cursor_on_group: Option<String>,
    pub collapsed: HashSet<String>,
    pub filter: String,
    filtered: Option<Vec<usize>>,
    pub mode: Mode,
    /// Keys are forwarded to the selected pane until `Ctrl-h`.
    pub insert: bool,

    pub width: u16,
    pub height: u16,
    /// Cleaned output of the selected pane.
    pub output: String,
    /// Lines scrolled up from the bottom of `output`; 0 follows the tail.
    pub scroll_from_bottom: usize,

    last_capture: String,
    force_refresh: bool,
    pending_goto_bottom: bool,
    pending_pane: Option<String>,
    quick_retried: bool,
    fast_armed: bool,
    slow_armed: bool,
    /// False until the first discovery result arrives.
    pub discovered: bool,

    pub status: Option<(String, Instant)>,
    pub should_quit: bool,

    pub stores: Stores,
    pub config: Config,
}

impl App {
    pub fn new(stores: Stores, config: Config, hooks_installed: bool) -> Self {
        let mut app = Self {
            sessions: Vec::new(),
            selected: 0,
            cursor_on_group: None,
            collapsed: HashSet::new(),
            filter: String::new(),
            filtered: None,
            mode: Mode::Normal,
            insert: false,
            width: 0,
            height: 0,
            output: String::new(),
            scroll_from_bottom: 0,
            last_capture: String::new(),
            force_refresh: false,
            pending_goto_bottom: false,
            pending_pane: None,
            quick_retried: false,
            fast_armed: false,
            slow_armed: false,
            discovered: false,
            status: None,
            should_quit: false,
            stores,
            config,
        };
        if !hooks_installed {
            app.status = Some((
                "Hooks not installed: press I to register them".to_string(),
                Instant::now() + HINT_TTL,
            ));
        }
        app
    }

    /// Commands to run once at startup.
    pub fn init(&mut self) -> Vec<Cmd> {
        let mut cmds = vec![Cmd::Discover];
        cmds.extend(self.arm_timers());
        cmds
    }

    pub fn update(&mut self, msg: Msg) -> Vec<Cmd> {
        if !self.mode.is_normal() {
            match msg {
                Msg::Key(key) => return self.on_modal_key(key),
                Msg::Mouse(_) => return Vec::new(),
                Msg::Resize { width, height } => return self.on_resize(width, height),
                _ => {}
            }
        }
        self.update_normal(msg)
    }

    fn update_normal(&mut self, msg: Msg) -> Vec<Cmd> {
        match msg {
            Msg::Key(key) => self.on_key(key),
            Msg::Mouse(event) => self.on_mouse(event),
            Msg::Resize { width, height } => self.on_resize(width, height),
            Msg::Tick(Tick::Capture) => {
                self.fast_armed = false;
                let mut cmds = self.arm_timers();
                cmds.extend(self.capture_cmd());
                cmds
            }
            Msg::Tick(Tick::Refresh) => {
                self.slow_armed = false;
                let mut cmds = vec![Cmd::Discover];
                cmds.extend(self.arm_timers());
                cmds
            }
            Msg::Tick(Tick::QuickRetry) => vec![Cmd::Discover],
            Msg::Discovered(sessions) => self.on_discovered(sessions),
            Msg::DiscoveryFailed(error) => {
                self.show_error(format!("Discovery failed: {error}"));
                Vec::new()
            }
            Msg::Captured { pane_id, content } => {
                self.apply_capture(&pane_id, content);
                Vec::new()
            }
            Msg::StateChanged(record) => self.on_state_changed(record),
            Msg::WatcherError(error) => {
                self.show_error(format!("State watcher: {error}"));
                Vec::new()
            }
            Msg::WatcherClosed => {
                tracing::debug!("State watcher stream closed");
                Vec::new()
            }
            Msg::Launched { pane_id } => {
                tracing::info!(pane = %pane_id, "Launched session");
                self.pending_pane = Some(pane_id);
                self.quick_retried = false;
                vec![Cmd::Discover]
            }
            Msg::Killed { pane_id } => self.on_killed(&pane_id),
            Msg::Notice(text) => {
                self.show_notice(text);
                Vec::new()
            }
            Msg::ProjectsScanned(projects) => {
                if let Mode::Picker(picker) = &mut self.mode {
                    picker.set_projects(projects);
                }
                Vec::new()
            }
            Msg::WorktreesListed {
                repo_root,
                worktrees,
            } => {
                if self.mode.is_normal() {
                    let list = WorktreeList::new(repo_root, worktrees);
                    if list.worktrees.is_empty() {
                        self.show_notice("No worktrees".to_string());
                    } else {
                        self.mode = Mode::Worktree(list);
                    }
                }
                Vec::new()
            }
            Msg::ActionFailed { action, error } => {
                if action == Action::SendKeys {
                    self.insert = false;
                }
                self.show_error(format!("{action} failed: {error}"));
                Vec::new()
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Timers and selection
    // ─────────────────────────────────────────────────────────────────────

    /// Schedules whichever timer is not already pending.
    fn arm_timers(&mut self) -> Vec<Cmd> {
        let mut cmds = Vec::new();
        if !self.fast_armed {
            self.fast_armed = true;
            cmds.push(Cmd::Schedule {
                tick: Tick::Capture,
                after: self.config.capture_interval(),
            });
        }
        if !self.slow_armed {
            self.slow_armed = true;
            cmds.push(Cmd::Schedule {
                tick: Tick::Refresh,
                after: self.config.refresh_interval(),
            });
        }
        cmds
    }

    pub fn selected_session(&self) -> Option<&Session> {
        self.sessions.get(self.selected)
    }

    fn selected_pane(&self) -> Option<String> {
        self.selected_session().map(|s| s.pane_id.clone())
    }

    fn capture_cmd(&self) -> Option<Cmd> {
        self.selected_session().map(|s| Cmd::Capture {
            pane_id: s.pane_id.clone(),
        })
    }

    fn resize_cmd(&self) -> Option<Cmd> {
        let (width, height) = self.viewport_size();
        let session = self.selected_session()?;
        (width > 0 && height > 0).then(|| Cmd::Resize {
            pane_id: session.pane_id.clone(),
            width,
            height,
        })
    }

    /// The observed session changed: drop the cached capture, size the new
    /// pane to the viewport, fetch it now and jump to its bottom once.
    fn select_changed(&mut self) -> Vec<Cmd> {
        self.last_capture.clear();
        self.force_refresh = true;
        self.pending_goto_bottom = true;
        self.resize_cmd().into_iter().chain(self.capture_cmd()).collect()
    }

    fn restore_selection(&mut self, pane: Option<&str>) {
        if let Some(idx) = pane.and_then(|p| self.sessions.iter().position(|s| s.pane_id == p)) {
            self.selected = idx;
        } else if self.selected >= self.sessions.len() {
            self.selected = self.sessions.len().saturating_sub(1);
        }
    }

    fn select_index(&mut self, idx: usize) -> Vec<Cmd> {
        self.cursor_on_group = None;
        if idx == self.selected {
            return Vec::new();
        }
        self.selected = idx;
        self.select_changed()
    }

    /// Leaves any modal mode.
    fn leave_mode(&mut self) -> Vec<Cmd> {
        self.mode = Mode::Normal;
        self.last_capture.clear();
        self.force_refresh = true;
        let mut cmds = self.arm_timers();
        cmds.extend(self.capture_cmd());
        cmds
    }

    // ─────────────────────────────────────────────────────────────────────
    // Background results
    // ─────────────────────────────────────────────────────────────────────

    fn on_discovered(&mut self, discovered: Vec<Session>) -> Vec<Cmd> {
        let before = self.selected_pane();
        let first = !self.discovered;
        self.discovered = true;

        let merged = carry_forward(&self.sessions, discovered);
        self.migrate_keys(&key_changes(&self.sessions, &merged));
        self.sessions = merged;
        self.prune_persisted();
        self.sessions = sort_sessions(&self.sessions, &self.stores.sidebar.snapshot());
        self.restore_selection(before.as_deref());
        self.refilter();

        let mut cmds = Vec::new();
        if let Some(pending) = self.pending_pane.clone() {
            if let Some(idx) = self.sessions.iter().position(|s| s.pane_id == pending) {
                self.pending_pane = None;
                self.quick_retried = false;
                self.selected = idx;
                self.cursor_on_group = None;
                return self.select_changed();
            }
            if !self.quick_retried {
                self.quick_retried = true;
                cmds.push(Cmd::Schedule {
                    tick: Tick::QuickRetry,
                    after: self.config.quick_retry(),
                });
            }
        }

        if first || self.selected_pane() != before {
            cmds.extend(self.select_changed());
        } else {
            cmds.extend(self.resize_cmd());
        }
        cmds
    }

    fn on_state_changed(&mut self, record: StateRecord) -> Vec<Cmd> {
        let before = self.selected_pane();
        let merged = merge_sessions(&self.sessions, std::slice::from_ref(&record));
        self.migrate_keys(&key_changes(&self.sessions, &merged));
        self.sessions = sort_sessions(&merged, &self.stores.sidebar.snapshot());
        self.restore_selection(before.as_deref());
        self.refilter();
        if self.selected_pane() != before {
            return self.select_changed();
        }
        Vec::new()
    }

    fn apply_capture(&mut self, pane_id: &str, content: String) {
        if self.selected_pane().as_deref() != Some(pane_id) {
            return;
        }
        if content == self.last_capture && !self.force_refresh {
            return;
        }
        self.output = clean_capture(&content);
        self.last_capture = content;
        self.force_refresh = false;
        if self.pending_goto_bottom {
            self.pending_goto_bottom = false;
            self.scroll_from_bottom = 0;
        } else {
            self.scroll_by(0);
        }
    }

    fn on_killed(&mut self, pane_id: &str) -> Vec<Cmd> {
        let Some(idx) = self.sessions.iter().position(|s| s.pane_id == pane_id) else {
            return Vec::new();
        };
        let removed = self.sessions.remove(idx);
        let key = removed.key();
        self.persist(|stores| stores.sidebar.update(|s| s.unpin(&key)).map(drop));
        self.prune_persisted();
        self.save_order();
        if self.selected >= self.sessions.len() {
            self.selected = self.sessions.len().saturating_sub(1);
        }
        self.refilter();
        self.show_notice(format!("Killed {}", self.label_for(&removed)));
        self.select_changed()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────

    fn persist<F>(&mut self, write: F)
    where
        F: FnOnce(&Stores) -> herd_core::Result<()>,
    {
        if let Err(e) = write(&self.stores) {
            self.show_error(format!("Save failed: {e}"));
        }
    }

    /// Moves pins, order entries, names and groups to a session's new key.
    fn migrate_keys(&mut self, changes: &[(String, String)]) {
        for (from, to) in changes {
            tracing::debug!(from = %from, to = %to, "Session key changed");
            self.persist(|stores| {
                stores.sidebar.update(|s| s.rekey(from, to))?;
                stores.names.rekey(from, to)?;
                stores.groups.rekey(from, to)?;
                Ok(())
            });
        }
    }

    /// Drops persisted entries for sessions that no longer exist.
    fn prune_persisted(&mut self) {
        let live = live_keys(&self.sessions);
        self.persist(|stores| {
            stores.sidebar.update(|s| s.prune(&live))?;
            stores.names.retain_live(&live)?;
            stores.groups.retain_live(&live)?;
            Ok(())
        });
    }

    fn save_order(&mut self) {
        let order: Vec<String> = self.sessions.iter().map(Session::key).collect();
        self.persist(|stores| {
            stores
                .sidebar
                .update(|s| {
                    let changed = s.order != order;
                    s.order = order;
                    changed
                })
                .map(drop)
        });
    }

    fn resort(&mut self) {
        let pane = self.selected_pane();
        self.sessions = sort_sessions(&self.sessions, &self.stores.sidebar.snapshot());
        self.restore_selection(pane.as_deref());
        self.refilter();
    }

    // ─────────────────────────────────────────────────────────────────────
    // View model
    // ─────────────────────────────────────────────────────────────────────

    pub fn view_items(&self) -> Vec<ViewItem> {
        match &self.filtered {
            Some(indices) => flat_items(indices),
            None => build_view_items(&self.sessions, &self.stores.groups.all(), &self.collapsed),
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered.is_some()
    }

    /// Recomputes the filter and keeps the selection inside the matches.
    fn refilter(&mut self) {
        self.filtered = apply_filter(&self.sessions, &self.stores.names.all(), &self.filter);
        if let Some(first) = self
            .filtered
            .as_ref()
            .filter(|indices| !indices.contains(&self.selected))
            .and_then(|indices| indices.first().copied())
        {
            self.selected = first;
            self.cursor_on_group = None;
        }
    }

    /// Custom name if set, otherwise the session's display name.
    pub fn label_for(&self, session: &Session) -> String {
        let custom = self.stores.names.get(&session.key());
        if custom.is_empty() {
            session.display_name()
        } else {
            custom
        }
    }

    fn group_of_selected(&self) -> Option<String> {
        let session = self.selected_session()?;
        let group = self.stores.groups.get(&session.key());
        (!group.is_empty()).then_some(group)
    }

    /// Output viewport size, zero before the first resize.
    pub fn viewport_size(&self) -> (u16, u16) {
        if self.width == 0 || self.height == 0 {
            return (0, 0);
        }
        let width = self
            .width
            .saturating_sub(self.sidebar_width() + 1)
            .max(MIN_VIEWPORT_WIDTH);
        let height = self
            .height
            .saturating_sub(HEADER_ROWS + OUTPUT_HEADER_ROWS + FOOTER_ROWS)
            .max(MIN_VIEWPORT_HEIGHT);
        (width, height)
    }

    pub fn sidebar_width(&self) -> u16 {
        self.config.sidebar_width
    }

    /// Whether the sidebar shows a filter bar above the list.
    pub fn shows_filter_bar(&self) -> bool {
        matches!(self.mode, Mode::Filter(_)) || self.is_filtered()
    }

    /// Screen row of the first sidebar item.
    pub fn list_top(&self) -> u16 {
        HEADER_ROWS + u16::from(self.shows_filter_bar())
    }

    /// Rows the session list is scrolled by to keep the cursor in view.
    pub fn sidebar_scroll(&self) -> u16 {
        if self.height == 0 {
            return 0;
        }
        let items = self.view_items();
        let visible = self.height.saturating_sub(self.list_top() + FOOTER_ROWS);
        cursor_position(&items, Some(self.selected), self.cursor_on_group.as_deref())
            .map_or(0, |cursor| scroll_offset(&items, cursor, visible))
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|(_, until)| Instant::now() < *until)
            .map(|(text, _)| text.as_str())
    }

    fn show_notice(&mut self, text: String) {
        self.status = Some((text, Instant::now() + NOTICE_TTL));
    }

    fn show_error(&mut self, text: String) {
        tracing::warn!(error = %text, "Dashboard error");
        self.status = Some((text, Instant::now() + ERROR_TTL));
    }

    fn scroll_by(&mut self, delta: isize) {
        let lines = self.output.lines().count();
        let (_, height) = self.viewport_size();
        let max = lines.saturating_sub(usize::from(height));
        self.scroll_from_bottom = self
            .scroll_from_bottom
            .saturating_add_signed(delta)
            .min(max);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Input
    // ─────────────────────────────────────────────────────────────────────

    fn on_resize(&mut self, width: u16, height: u16) -> Vec<Cmd> {
        self.width = width;
        self.height = height;
        self.scroll_by(0);
        self.resize_cmd().into_iter().collect()
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Cmd> {
        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        if self.insert {
            return self.forward_key(&key);
        }
        if keys::is_ctrl_c(&key) {
            return self.quit();
        }

        match key.code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Char('j') | KeyCode::Down => self.navigate(Direction::Down),
            KeyCode::Char('k') | KeyCode::Up => self.navigate(Direction::Up),
            KeyCode::Char('J') => self.move_selected(Direction::Down),
            KeyCode::Char('K') => self.move_selected(Direction::Up),
            KeyCode::Char('p') => {
                self.toggle_pin();
                Vec::new()
            }
            KeyCode::Tab | KeyCode::Char(' ') => self.toggle_group(),
            KeyCode::Char('g') => {
                if self.cursor_on_group.is_none() {
                    if let Some(key) = self.selected_session().map(Session::key) {
                        let prompt = Prompt::with_value(self.stores.groups.get(&key));
                        self.mode = Mode::GroupAssign { key, prompt };
                    }
                }
                Vec::new()
            }
            KeyCode::Char('R') => {
                if let Some(key) = self.selected_session().map(Session::key) {
                    let prompt = Prompt::with_value(self.stores.names.get(&key));
                    self.mode = Mode::Rename { key, prompt };
                }
                Vec::new()
            }
            KeyCode::Char('/') => {
                self.mode = Mode::Filter(Prompt::with_value(self.filter.clone()));
                Vec::new()
            }
            KeyCode::Esc if self.is_filtered() => {
                self.filter.clear();
                self.refilter();
                Vec::new()
            }
            KeyCode::Char('n') => {
                let existing = self
                    .sessions
                    .iter()
                    .map(|s| s.project_path.clone())
                    .filter(|p| !p.is_empty())
                    .collect();
                self.mode = Mode::Picker(Picker::loading());
                vec![Cmd::ScanProjects { existing }]
            }
            KeyCode::Char('d') => {
                if let Some(pane_id) = self.selected_pane() {
                    self.mode = Mode::Review {
                        pane_id,
                        prompt: Prompt::default(),
                    };
                }
                Vec::new()
            }
            KeyCode::Char('w') => match self.selected_session() {
                Some(s) if !s.git_root.is_empty() => vec![Cmd::ListWorktrees {
                    repo_root: s.git_root.clone(),
                }],
                Some(_) => {
                    self.show_notice("Not a git repository".to_string());
                    Vec::new()
                }
                None => Vec::new(),
            },
            KeyCode::Char('t') => self
                .selected_pane()
                .map(|pane_id| Cmd::SwitchTo { pane_id })
                .into_iter()
                .collect(),
            KeyCode::Char('x') => self
                .selected_pane()
                .map(|pane_id| Cmd::Kill { pane_id })
                .into_iter()
                .collect(),
            KeyCode::Char('i') => {
                self.insert = self.selected_session().is_some();
                Vec::new()
            }
            KeyCode::Char('r') => vec![Cmd::Discover],
            KeyCode::Char('I') => vec![Cmd::InstallHooks],
            KeyCode::PageUp => {
                let (_, height) = self.viewport_size();
                self.scroll_by(isize::try_from(height).unwrap_or(isize::MAX));
                Vec::new()
            }
            KeyCode::PageDown => {
                let (_, height) = self.viewport_size();
                self.scroll_by(-isize::try_from(height).unwrap_or(isize::MAX));
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn forward_key(&mut self, key: &KeyEvent) -> Vec<Cmd> {
        if keys::is_exit_insert(key) {
            self.insert = false;
            return Vec::new();
        }
        let Some(pane_id) = self.selected_pane() else {
            self.insert = false;
            return Vec::new();
        };
        let send = match keys::forward_for(key) {
            Some(Forward::Named(name)) => Cmd::SendKey {
                pane_id: pane_id.clone(),
                name,
            },
            Some(Forward::Literal(text)) => Cmd::SendLiteral {
                pane_id: pane_id.clone(),
                text,
            },
            None => return Vec::new(),
        };
        vec![send, Cmd::Capture { pane_id }]
    }

    fn quit(&mut self) -> Vec<Cmd> {
        self.should_quit = true;
        self.sessions
            .iter()
            .map(|s| Cmd::RestoreSize {
                pane_id: s.pane_id.clone(),
            })
            .collect()
    }

    fn navigate(&mut self, direction: Direction) -> Vec<Cmd> {
        let items = self.view_items();
        let pos = cursor_position(&items, Some(self.selected), self.cursor_on_group.as_deref());
        match step(&items, pos, direction).cloned() {
            Some(ViewItem::Header { group, .. }) => {
                self.cursor_on_group = Some(group);
                Vec::new()
            }
            Some(ViewItem::Row { index, .. }) if index != self.selected => self.select_index(index),
            Some(ViewItem::Row { .. }) | None => {
                if pos.is_some() {
                    self.cursor_on_group = None;
                }
                self.capture_cmd().into_iter().collect()
            }
        }
    }

    fn move_selected(&mut self, direction: Direction) -> Vec<Cmd> {
        if self.is_filtered() || self.cursor_on_group.is_some() {
            return Vec::new();
        }
        let idx = self.selected;
        let sessions = &mut self.sessions;
        let mut moved = None;
        let result = self.stores.sidebar.update(|state| {
            moved = move_session(sessions, idx, direction, state);
            moved.is_some()
        });
        if let Err(e) = result {
            self.show_error(format!("Save failed: {e}"));
        }
        match moved {
            Some(new_idx) => {
                self.selected = new_idx;
                self.select_changed()
            }
            None => Vec::new(),
        }
    }

    /// Pins or unpins the selected session. A grouped session (or a
    /// collapsed header under the cursor) pins its whole group, members
    /// taking consecutive counters in list order.
    fn toggle_pin(&mut self) {
        let groups = self.stores.groups.all();
        let group = self
            .cursor_on_group
            .clone()
            .or_else(|| self.group_of_selected());
        let targets: Vec<String> = match &group {
            Some(group) => self
                .sessions
                .iter()
                .map(Session::key)
                .filter(|key| groups.get(key) == Some(group))
                .collect(),
            None => self.selected_session().map(Session::key).into_iter().collect(),
        };
        let Some(first) = targets.first() else {
            return;
        };
        let anchor = self
            .selected_session()
            .map(Session::key)
            .filter(|key| targets.contains(key))
            .unwrap_or_else(|| first.clone());

        let pin = !self.stores.sidebar.snapshot().is_pinned(&anchor);
        self.persist(|stores| {
            stores
                .sidebar
                .update(|s| {
                    for key in &targets {
                        if pin {
                            s.pin(key);
                        } else {
                            s.unpin(key);
                        }
                    }
                    true
                })
                .map(drop)
        });
        self.resort();
        self.save_order();
    }

    fn toggle_group(&mut self) -> Vec<Cmd> {
        if let Some(group) = self.cursor_on_group.take() {
            self.collapsed.remove(&group);
            let groups = self.stores.groups.all();
            let first = self
                .sessions
                .iter()
                .position(|s| groups.get(&s.key()) == Some(&group));
            return match first {
                Some(idx) => self.select_index(idx),
                None => Vec::new(),
            };
        }
        if let Some(group) = self.group_of_selected() {
            if !self.collapsed.remove(&group) {
                self.collapsed.insert(group.clone());
                self.cursor_on_group = Some(group);
            }
        }
        Vec::new()
    }

    fn on_mouse(&mut self, event: MouseEvent) -> Vec<Cmd> {
        match event.kind {
            MouseEventKind::ScrollUp => {
                self.scroll_by(SCROLL_STEP as isize);
                Vec::new()
            }
            MouseEventKind::ScrollDown => {
                self.scroll_by(-(SCROLL_STEP as isize));
                Vec::new()
            }
            MouseEventKind::Down(MouseButton::Left) if event.column < self.sidebar_width() => {
                let Some(row) = event.row.checked_sub(self.list_top()) else {
                    return Vec::new();
                };
                let items = self.view_items();
                let row = row.saturating_add(self.sidebar_scroll());
                match item_at_row(&items, row).cloned() {
                    Some(ViewItem::Header { group, .. }) => {
                        if self.collapsed.remove(&group) {
                            if self.cursor_on_group.as_deref() == Some(group.as_str()) {
                                self.cursor_on_group = None;
                            }
                        } else {
                            if self.group_of_selected().as_deref() == Some(group.as_str()) {
                                self.cursor_on_group = Some(group.clone());
                            }
                            self.collapsed.insert(group);
                        }
                        Vec::new()
                    }
                    Some(ViewItem::Row { index, .. }) => self.select_index(index),
                    None => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    fn on_modal_key(&mut self, key: KeyEvent) -> Vec<Cmd> {
        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        match std::mem::take(&mut self.mode) {
            Mode::Normal => self.on_key(key),
            Mode::Filter(mut prompt) => {
                let before = self.selected_pane();
                let mut cmds = match key.code {
                    KeyCode::Up | KeyCode::Down => {
                        let direction = if key.code == KeyCode::Up {
                            Direction::Up
                        } else {
                            Direction::Down
                        };
                        self.mode = Mode::Filter(prompt);
                        return self.navigate(direction);
                    }
                    _ => match prompt.handle_key(&key) {
                        Outcome::Pending => {
                            self.filter = prompt.value.clone();
                            self.mode = Mode::Filter(prompt);
                            self.refilter();
                            Vec::new()
                        }
                        Outcome::Submit(query) => {
                            self.filter = query;
                            self.refilter();
                            self.leave_mode()
                        }
                        Outcome::Cancel => {
                            self.filter.clear();
                            self.refilter();
                            self.leave_mode()
                        }
                    },
                };
                if self.selected_pane() != before {
                    cmds.extend(self.select_changed());
                }
                cmds
            }
            Mode::Rename { key: session, mut prompt } => match prompt.handle_key(&key) {
                Outcome::Pending => {
                    self.mode = Mode::Rename {
                        key: session,
                        prompt,
                    };
                    Vec::new()
                }
                Outcome::Submit(name) => {
                    self.persist(|stores| stores.names.set(&session, &name));
                    self.refilter();
                    self.leave_mode()
                }
                Outcome::Cancel => self.leave_mode(),
            },
            Mode::GroupAssign { key: session, mut prompt } => match prompt.handle_key(&key) {
                Outcome::Pending => {
                    self.mode = Mode::GroupAssign {
                        key: session,
                        prompt,
                    };
                    Vec::new()
                }
                Outcome::Submit(group) => {
                    self.persist(|stores| stores.groups.set(&session, &group));
                    self.leave_mode()
                }
                Outcome::Cancel => self.leave_mode(),
            },
            Mode::Picker(mut picker) => match picker.handle_key(&key) {
                Outcome::Pending => {
                    self.mode = Mode::Picker(picker);
                    Vec::new()
                }
                Outcome::Submit(path) => {
                    let mut cmds = self.leave_mode();
                    cmds.push(Cmd::Launch { path });
                    cmds
                }
                Outcome::Cancel => self.leave_mode(),
            },
            Mode::Review { pane_id, mut prompt } => match prompt.handle_key(&key) {
                Outcome::Pending => {
                    self.mode = Mode::Review { pane_id, prompt };
                    Vec::new()
                }
                Outcome::Submit(text) => {
                    let mut cmds = Vec::new();
                    if !text.is_empty() {
                        cmds.push(Cmd::SendFeedback { pane_id, text });
                    }
                    cmds.extend(self.leave_mode());
                    cmds
                }
                Outcome::Cancel => self.leave_mode(),
            },
            Mode::Worktree(mut list) => match list.handle_key(&key) {
                Outcome::Pending => {
                    self.mode = Mode::Worktree(list);
                    Vec::new()
                }
                Outcome::Submit(path) => {
                    let mut cmds = self.leave_mode();
                    cmds.extend(self.open_or_switch(&path));
                    cmds
                }
                Outcome::Cancel => self.leave_mode(),
            },
        }
    }

    /// Selects a session already running under `path`, or launches one.
    fn open_or_switch(&mut self, path: &str) -> Vec<Cmd> {
        let base = path.trim_end_matches('/');
        let existing = self.sessions.iter().position(|s| {
            s.project_path == base
                || s.project_path
                    .strip_prefix(base)
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        match existing {
            Some(idx) => {
                self.filter.clear();
                self.refilter();
                self.select_index(idx)
            }
            None => vec![Cmd::Launch {
                path: path.to_string(),
            }],
        }
    }
}
