//! herd: terminal dashboard for agent sessions running in tmux panes.
//!
//! ## Subcommands
//!
//! - *(none)*: run the dashboard (must be started inside tmux)
//! - `hook <EVENT>`: record a hook event, reading the agent's JSON from stdin
//! - `install`: register herd's hooks in the agent's settings

mod app;
mod hook;
mod logging;
mod runtime;
mod ui;

use std::env;
use std::io;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use herd_core::{
    hooks_installed, install_hooks, Config, ControlPlane, Discovery, GitCli, GitProbe, HerdError,
    StateStore, StorageConfig, TmuxClient,
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::app::{App, Stores};
use crate::runtime::Services;

#[derive(Parser)]
#[command(name = "herd")]
#[command(about = "Dashboard for agent sessions running in tmux")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a hook event (reads JSON from stdin)
    Hook {
        /// Hook event name, e.g. PreToolUse
        #[arg(value_name = "EVENT")]
        event: String,
    },

    /// Register herd's hooks in the agent's settings.json
    Install,
}

fn main() {
    let cli = Cli::parse();
    let storage = StorageConfig::from_env();
    let _logging_guard = storage.as_ref().ok().and_then(logging::init);

    match cli.command {
        Some(Commands::Hook { event }) => {
            // Never fail the agent's hook pipeline; errors only reach the log.
            if let Err(e) = storage.and_then(|storage| hook::run(&storage, &event)) {
                tracing::error!(error = %e, event = %event, "herd hook failed");
            }
        }
        Some(Commands::Install) => {
            match storage.and_then(|storage| install_hooks(&storage, &herd_binary())) {
                Ok(result) => println!("{}", result.message()),
                Err(e) => {
                    tracing::error!(error = %e, "herd install failed");
                    eprintln!("herd: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            if let Err(e) = storage.and_then(dashboard) {
                tracing::error!(error = %e, "Dashboard exited with error");
                eprintln!("herd: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Absolute path of this executable, as written into hook commands.
fn herd_binary() -> String {
    env::current_exe()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "herd".to_string())
}

fn dashboard(storage: StorageConfig) -> herd_core::Result<()> {
    if env::var_os("TMUX").map_or(true, |value| value.is_empty()) {
        return Err(HerdError::NotInTmux);
    }
    storage.ensure_dirs()?;

    let config = Config::load(&storage);
    let control: Arc<dyn ControlPlane> = Arc::new(TmuxClient::new());
    let git: Arc<dyn GitProbe> = Arc::new(GitCli);
    let discovery = Discovery::new(
        StateStore::new(storage.sessions_dir()),
        Arc::clone(&control),
        Arc::clone(&git),
    );
    let mut app = App::new(Stores::load(&storage), config.clone(), hooks_installed(&storage));
    let services = Arc::new(Services {
        control,
        git,
        discovery,
        storage,
        config,
        herd_binary: herd_binary(),
        home: dirs::home_dir(),
    });

    tracing::info!("Dashboard starting");
    let terminal_error = |e: io::Error| HerdError::io("terminal", e);

    enable_raw_mode().map_err(terminal_error)?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture).map_err(terminal_error)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(terminal_error)?;

    let result = runtime::run(&mut terminal, &mut app, services);

    disable_raw_mode().map_err(terminal_error)?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .map_err(terminal_error)?;
    terminal.show_cursor().map_err(terminal_error)?;

    tracing::info!("Dashboard stopped");
    result.map_err(terminal_error)
}
