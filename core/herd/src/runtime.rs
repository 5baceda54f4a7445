//! Executes the commands returned by [`App::update`] off the UI thread and
//! feeds their results back as messages.
//!
//! Work runs on three long-lived lanes so a slow discovery pass never delays
//! keystrokes or pane captures:
//!
//! - **input**: batches containing forwarded keys, strictly in issue order
//! - **view**: capture and resize of the observed pane
//! - **background**: discovery, launches, kills, hook install and scans
//!
//! Timers are owned by a single thread that sleeps until the earliest
//! deadline.

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use herd_core::{
    expand_home, install_hooks, scan_projects, Config, ControlPlane, Discovery, GitProbe,
    HerdError, StateStore, StateWatcher, StorageConfig, WatchStreams,
};
use ratatui::backend::Backend;
use ratatui::Terminal;

use crate::app::{Action, App, Cmd, Msg, Tick};
use crate::ui;

/// Everything a command needs to reach the outside world.
pub struct Services {
    pub control: Arc<dyn ControlPlane>,
    pub git: Arc<dyn GitProbe>,
    pub discovery: Discovery,
    pub storage: StorageConfig,
    pub config: Config,
    /// Absolute path of the running executable, written into hook commands.
    pub herd_binary: String,
    pub home: Option<PathBuf>,
}

/// Runs one command to completion. `Schedule` is handled by the runtime's
/// timer thread and yields nothing here.
pub fn execute(cmd: &Cmd, services: &Services) -> Option<Msg> {
    let control = services.control.as_ref();
    match cmd {
        Cmd::Schedule { .. } => None,
        Cmd::Discover => Some(match services.discovery.run() {
            Ok(sessions) => Msg::Discovered(sessions),
            Err(e) => Msg::DiscoveryFailed(e.to_string()),
        }),
        Cmd::Capture { pane_id } => {
            match control.capture_pane(pane_id, services.config.scrollback_lines) {
                Ok(content) => Some(Msg::Captured {
                    pane_id: pane_id.clone(),
                    content,
                }),
                Err(e) => {
                    tracing::debug!(pane = %pane_id, error = %e, "Capture failed");
                    None
                }
            }
        }
        Cmd::Resize {
            pane_id,
            width,
            height,
        } => {
            if let Err(e) = control.resize_window(pane_id, *width, *height) {
                tracing::debug!(pane = %pane_id, error = %e, "Resize failed");
            }
            None
        }
        Cmd::RestoreSize { pane_id } => {
            if let Err(e) = control.restore_window_size(pane_id) {
                tracing::debug!(pane = %pane_id, error = %e, "Restore size failed");
            }
            None
        }
        Cmd::SwitchTo { pane_id } => control
            .switch_to_pane(pane_id)
            .err()
            .map(|e| failed(Action::Jump, e)),
        Cmd::Kill { pane_id } => Some(match control.kill_pane(pane_id) {
            Ok(()) => Msg::Killed {
                pane_id: pane_id.clone(),
            },
            Err(e) => failed(Action::Kill, e),
        }),
        Cmd::Launch { path } => Some(match launch(path, services) {
            Ok(pane_id) => Msg::Launched { pane_id },
            Err(e) => failed(Action::Launch, e),
        }),
        Cmd::SendLiteral { pane_id, text } => control
            .send_literal(pane_id, text)
            .err()
            .map(|e| failed(Action::SendKeys, e)),
        Cmd::SendKey { pane_id, name } => control
            .send_key_name(pane_id, name)
            .err()
            .map(|e| failed(Action::SendKeys, e)),
        Cmd::SendFeedback { pane_id, text } => {
            let sent = control
                .send_literal(pane_id, text)
                .and_then(|()| control.send_key_name(pane_id, "Enter"));
            Some(match sent {
                Ok(()) => Msg::Notice("Feedback sent".to_string()),
                Err(e) => failed(Action::Feedback, e),
            })
        }
        Cmd::InstallHooks => Some(
            match install_hooks(&services.storage, &services.herd_binary) {
                Ok(result) => Msg::Notice(result.message()),
                Err(e) => failed(Action::InstallHooks, e),
            },
        ),
        Cmd::ScanProjects { existing } => {
            let roots = services.config.expanded_project_dirs(services.home.as_deref());
            Some(Msg::ProjectsScanned(scan_projects(&roots, existing)))
        }
        Cmd::ListWorktrees { repo_root } => Some(match services.git.worktrees(repo_root) {
            Ok(worktrees) => Msg::WorktreesListed {
                repo_root: repo_root.clone(),
                worktrees,
            },
            Err(e) => failed(Action::ListWorktrees, e),
        }),
    }
}

fn failed(action: Action, error: HerdError) -> Msg {
    tracing::warn!(action = %action, error = %error, "Action failed");
    Msg::ActionFailed {
        action,
        error: error.to_string(),
    }
}

/// Opens a new window running the agent in `path`, inside the tmux session
/// the dashboard runs in.
fn launch(path: &str, services: &Services) -> herd_core::Result<String> {
    let dir = expand_home(path, services.home.as_deref());
    if !dir.is_dir() {
        return Err(HerdError::NotADirectory(dir));
    }
    let container = services.control.current_container()?;
    let pane_id = services.control.new_window(
        &container,
        &dir.to_string_lossy(),
        &services.config.agent_command,
    )?;
    tracing::info!(path = %dir.display(), pane = %pane_id, "Opened agent window");
    Ok(pane_id)
}

// ─────────────────────────────────────────────────────────────────────────────
// Threads
// ─────────────────────────────────────────────────────────────────────────────

pub struct Runtime {
    services: Arc<Services>,
    timers: Sender<(Instant, Tick)>,
    input: Sender<Vec<Cmd>>,
    view: Sender<Vec<Cmd>>,
    background: Sender<Vec<Cmd>>,
}

impl Runtime {
    pub fn start(services: Arc<Services>, tx: &Sender<Msg>) -> io::Result<Self> {
        let (timers, timer_rx) = mpsc::channel();
        let timer_tx = tx.clone();
        spawn("herd-timers", move || timer_loop(&timer_rx, &timer_tx))?;

        Ok(Self {
            timers,
            input: lane("herd-input", &services, tx)?,
            view: lane("herd-view", &services, tx)?,
            background: lane("herd-background", &services, tx)?,
            services,
        })
    }

    pub fn dispatch(&self, cmds: Vec<Cmd>) {
        let mut work = Vec::new();
        for cmd in cmds {
            match cmd {
                Cmd::Schedule { tick, after } => {
                    let _ = self.timers.send((Instant::now() + after, tick));
                }
                other => work.push(other),
            }
        }
        if work.is_empty() {
            return;
        }
        if work.iter().any(Cmd::is_key_forward) {
            let _ = self.input.send(work);
            return;
        }
        let (view, background): (Vec<Cmd>, Vec<Cmd>) = work.into_iter().partition(|cmd| {
            matches!(
                cmd,
                Cmd::Capture { .. } | Cmd::Resize { .. } | Cmd::RestoreSize { .. }
            )
        });
        if !view.is_empty() {
            let _ = self.view.send(view);
        }
        if !background.is_empty() {
            let _ = self.background.send(background);
        }
    }

    /// Runs commands on the calling thread, ignoring their results.
    pub fn run_now(&self, cmds: Vec<Cmd>) {
        for cmd in &cmds {
            execute(cmd, &self.services);
        }
    }
}

fn spawn<F>(name: &str, body: F) -> io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map(drop)
}

fn lane(name: &str, services: &Arc<Services>, tx: &Sender<Msg>) -> io::Result<Sender<Vec<Cmd>>> {
    let (lane_tx, lane_rx) = mpsc::channel::<Vec<Cmd>>();
    let services = Arc::clone(services);
    let tx = tx.clone();
    spawn(name, move || {
        for batch in lane_rx {
            for cmd in &batch {
                if let Some(msg) = execute(cmd, &services) {
                    if tx.send(msg).is_err() {
                        return;
                    }
                }
            }
        }
    })?;
    Ok(lane_tx)
}

fn timer_loop(rx: &Receiver<(Instant, Tick)>, tx: &Sender<Msg>) {
    let mut pending: Vec<(Instant, Tick)> = Vec::new();
    loop {
        let now = Instant::now();
        pending.sort_by_key(|(at, _)| *at);
        let due = pending.iter().take_while(|(at, _)| *at <= now).count();
        for (_, tick) in pending.drain(..due) {
            if tx.send(Msg::Tick(tick)).is_err() {
                return;
            }
        }

        let received = match pending.first() {
            Some((at, _)) => rx.recv_timeout(at.saturating_duration_since(now)),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(entry) => pending.push(entry),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Forwards terminal input until the receiver is gone.
pub fn spawn_input_reader(tx: Sender<Msg>) -> io::Result<()> {
    use crossterm::event::{self, Event};
    spawn("herd-terminal", move || loop {
        let msg = match event::read() {
            Ok(Event::Key(key)) => Msg::Key(key),
            Ok(Event::Mouse(mouse)) => Msg::Mouse(mouse),
            Ok(Event::Resize(width, height)) => Msg::Resize { width, height },
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(error = %e, "Terminal input failed");
                return;
            }
        };
        if tx.send(msg).is_err() {
            return;
        }
    })
}

/// Bridges the state watcher's streams into the message channel.
pub fn spawn_watcher_bridge(streams: WatchStreams, tx: &Sender<Msg>) -> io::Result<()> {
    let WatchStreams { events, errors } = streams;
    let error_tx = tx.clone();
    spawn("herd-watch-errors", move || {
        for error in errors {
            if error_tx.send(Msg::WatcherError(error)).is_err() {
                return;
            }
        }
    })?;
    let event_tx = tx.clone();
    spawn("herd-watch-events", move || {
        for record in events {
            if event_tx.send(Msg::StateChanged(record)).is_err() {
                return;
            }
        }
        let _ = event_tx.send(Msg::WatcherClosed);
    })
}

/// Drives the dashboard until the user quits.
pub fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    services: Arc<Services>,
) -> io::Result<()> {
    let (tx, rx) = mpsc::channel();
    let runtime = Runtime::start(Arc::clone(&services), &tx)?;

    // The watcher must outlive the loop; dropping it stops the stream.
    let _watcher = match StateWatcher::start(StateStore::new(services.storage.sessions_dir())) {
        Ok((watcher, streams)) => {
            spawn_watcher_bridge(streams, &tx)?;
            Some(watcher)
        }
        Err(e) => {
            tracing::warn!(error = %e, "State watcher unavailable, relying on polling");
            let _ = tx.send(Msg::WatcherError(e.to_string()));
            None
        }
    };
    spawn_input_reader(tx.clone())?;

    let size = terminal.size()?;
    let mut cmds = app.init();
    cmds.extend(app.update(Msg::Resize {
        width: size.width,
        height: size.height,
    }));
    runtime.dispatch(cmds);
    terminal.draw(|frame| ui::draw(frame, app))?;

    while let Ok(first) = rx.recv() {
        let mut next = Some(first);
        while let Some(msg) = next {
            let cmds = app.update(msg);
            if app.should_quit {
                runtime.run_now(cmds);
                return Ok(());
            }
            runtime.dispatch(cmds);
            next = rx.try_recv().ok();
        }
        terminal.draw(|frame| ui::draw(frame, app))?;
    }
    Ok(())
}
