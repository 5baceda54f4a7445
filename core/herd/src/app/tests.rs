use std::time::Duration;

use chrono::{TimeZone, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use herd_core::{Config, Session, StorageConfig, Worktree};
use herd_protocol::{SessionState, StateRecord};
use tempfile::TempDir;

use super::*;

fn session(id: &str, pane: &str) -> Session {
    Session {
        id: id.to_string(),
        pane_id: pane.to_string(),
        container: "main".to_string(),
        project_path: format!("/work/{}", if id.is_empty() { pane.trim_start_matches('%') } else { id }),
        state: SessionState::Idle,
        ..Session::default()
    }
}

fn new_app() -> (TempDir, App) {
    let temp = TempDir::new().unwrap();
    let storage = StorageConfig::with_root(temp.path().join(".herd"));
    storage.ensure_dirs().unwrap();
    let app = App::new(Stores::load(&storage), Config::default(), true);
    (temp, app)
}

/// App sized to 120x40 with `sessions` discovered and the first selected.
fn ready(sessions: Vec<Session>) -> (TempDir, App) {
    let (temp, mut app) = new_app();
    app.update(Msg::Resize {
        width: 120,
        height: 40,
    });
    app.update(Msg::Discovered(sessions));
    (temp, app)
}

fn press(app: &mut App, code: KeyCode) -> Vec<Cmd> {
    app.update(Msg::Key(KeyEvent::new(code, KeyModifiers::NONE)))
}

fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
        press(app, KeyCode::Char(c));
    }
}

fn click(app: &mut App, column: u16, row: u16) -> Vec<Cmd> {
    app.update(Msg::Mouse(MouseEvent {
        kind: MouseEventKind::Down(MouseButton::Left),
        column,
        row,
        modifiers: KeyModifiers::NONE,
    }))
}

fn resize(pane: &str) -> Cmd {
    Cmd::Resize {
        pane_id: pane.to_string(),
        width: 87,
        height: 37,
    }
}

fn capture(pane: &str) -> Cmd {
    Cmd::Capture {
        pane_id: pane.to_string(),
    }
}

fn selected_pane(app: &App) -> &str {
    app.selected_session().map(|s| s.pane_id.as_str()).unwrap_or("")
}

#[test]
fn test_init_discovers_and_arms_each_timer_once() {
    let (_temp, mut app) = new_app();
    assert_eq!(
        app.init(),
        vec![
            Cmd::Discover,
            Cmd::Schedule {
                tick: Tick::Capture,
                after: Duration::from_millis(100)
            },
            Cmd::Schedule {
                tick: Tick::Refresh,
                after: Duration::from_secs(3)
            },
        ]
    );
    // Already armed: leaving a mode must not stack a second timer.
    press(&mut app, KeyCode::Char('/'));
    let cmds = press(&mut app, KeyCode::Esc);
    assert!(cmds.iter().all(|c| !matches!(c, Cmd::Schedule { .. })));
}

#[test]
fn test_capture_tick_rearms_only_the_fast_timer() {
    let (_temp, mut app) = ready(vec![session("a", "%1")]);
    app.init();
    let cmds = app.update(Msg::Tick(Tick::Capture));
    assert_eq!(
        cmds,
        vec![
            Cmd::Schedule {
                tick: Tick::Capture,
                after: Duration::from_millis(100)
            },
            capture("%1"),
        ]
    );
}

#[test]
fn test_first_discovery_sizes_then_fetches_selected_pane() {
    let (_temp, mut app) = new_app();
    app.update(Msg::Resize {
        width: 120,
        height: 40,
    });
    let cmds = app.update(Msg::Discovered(vec![session("a", "%1"), session("b", "%2")]));
    assert_eq!(cmds, vec![resize("%1"), capture("%1")]);
    assert!(app.discovered);
}

#[test]
fn test_viewport_has_a_floor() {
    let (_temp, mut app) = new_app();
    assert_eq!(app.viewport_size(), (0, 0));
    app.update(Msg::Resize {
        width: 20,
        height: 4,
    });
    assert_eq!(app.viewport_size(), (10, 3));
}

#[test]
fn test_selection_change_jumps_to_bottom_once() {
    let (_temp, mut app) = ready(vec![session("a", "%1"), session("b", "%2")]);
    let body: String = (0..100).map(|i| format!("line {i}\n")).collect();

    let cmds = press(&mut app, KeyCode::Char('j'));
    assert_eq!(cmds, vec![resize("%2"), capture("%2")]);

    app.scroll_from_bottom = 20;
    app.update(Msg::Captured {
        pane_id: "%2".into(),
        content: body.clone(),
    });
    assert_eq!(app.scroll_from_bottom, 0);
    assert!(app.output.starts_with("line 0"));

    // Later captures keep the user's scroll position.
    app.scroll_from_bottom = 20;
    app.update(Msg::Captured {
        pane_id: "%2".into(),
        content: format!("{body}line 100\n"),
    });
    assert_eq!(app.scroll_from_bottom, 20);
}

#[test]
fn test_capture_for_another_pane_is_dropped() {
    let (_temp, mut app) = ready(vec![session("a", "%1"), session("b", "%2")]);
    app.update(Msg::Captured {
        pane_id: "%2".into(),
        content: "stale".into(),
    });
    assert_eq!(app.output, "");

    app.update(Msg::Captured {
        pane_id: "%1".into(),
        content: "fresh".into(),
    });
    assert_eq!(app.output, "fresh");
}

#[test]
fn test_identical_capture_is_applied_after_mode_exit() {
    let (_temp, mut app) = ready(vec![session("a", "%1")]);
    app.update(Msg::Captured {
        pane_id: "%1".into(),
        content: "same".into(),
    });
    app.output = "overwritten".into();
    app.update(Msg::Captured {
        pane_id: "%1".into(),
        content: "same".into(),
    });
    assert_eq!(app.output, "overwritten");

    press(&mut app, KeyCode::Char('R'));
    let cmds = press(&mut app, KeyCode::Esc);
    assert!(cmds.contains(&capture("%1")));
    app.update(Msg::Captured {
        pane_id: "%1".into(),
        content: "same".into(),
    });
    assert_eq!(app.output, "same");
}

#[test]
fn test_modal_views_keep_polling() {
    let (_temp, mut app) = ready(vec![session("a", "%1"), session("b", "%2")]);
    app.init();
    press(&mut app, KeyCode::Char('/'));
    assert!(matches!(app.mode, Mode::Filter(_)));

    let cmds = app.update(Msg::Tick(Tick::Capture));
    assert!(cmds.contains(&capture("%1")));
    let cmds = app.update(Msg::Tick(Tick::Refresh));
    assert!(cmds.contains(&Cmd::Discover));

    // Letters are text while filtering, not navigation.
    press(&mut app, KeyCode::Char('j'));
    assert_eq!(app.filter, "j");
    assert!(matches!(app.mode, Mode::Filter(_)));
}

#[test]
fn test_filter_narrows_and_moves_selection() {
    let (_temp, mut app) = ready(vec![session("api", "%1"), session("web", "%2")]);
    press(&mut app, KeyCode::Char('/'));
    type_text(&mut app, "we");
    assert_eq!(selected_pane(&app), "%2");
    assert_eq!(app.view_items().len(), 1);

    let cmds = press(&mut app, KeyCode::Enter);
    assert!(app.mode.is_normal());
    assert!(app.is_filtered());
    assert!(cmds.contains(&capture("%2")));

    press(&mut app, KeyCode::Esc);
    assert!(!app.is_filtered());
    assert_eq!(app.view_items().len(), 2);
}

#[test]
fn test_launch_waits_for_pane_with_one_quick_retry() {
    let (_temp, mut app) = ready(vec![session("a", "%1")]);
    assert_eq!(
        app.update(Msg::Launched {
            pane_id: "%9".into()
        }),
        vec![Cmd::Discover]
    );

    let cmds = app.update(Msg::Discovered(vec![session("a", "%1")]));
    assert!(cmds.contains(&Cmd::Schedule {
        tick: Tick::QuickRetry,
        after: Duration::from_millis(500)
    }));
    let cmds = app.update(Msg::Discovered(vec![session("a", "%1")]));
    assert!(!cmds
        .iter()
        .any(|c| matches!(c, Cmd::Schedule { tick: Tick::QuickRetry, .. })));

    let cmds = app.update(Msg::Discovered(vec![
        session("a", "%1"),
        session("", "%9"),
    ]));
    assert_eq!(selected_pane(&app), "%9");
    assert_eq!(cmds, vec![resize("%9"), capture("%9")]);
}

#[test]
fn test_rediscovery_keeps_selection_by_pane() {
    let (_temp, mut app) = ready(vec![session("a", "%1"), session("b", "%2")]);
    press(&mut app, KeyCode::Char('j'));
    let cmds = app.update(Msg::Discovered(vec![
        session("new", "%3"),
        session("a", "%1"),
        session("b", "%2"),
    ]));
    assert_eq!(selected_pane(&app), "%2");
    assert_eq!(cmds, vec![resize("%2")]);
}

#[test]
fn test_rediscovery_does_not_regress_live_state() {
    let (_temp, mut app) = ready(vec![session("a", "%1")]);
    app.update(Msg::StateChanged(StateRecord {
        session_id: "a".into(),
        tmux_pane: "%1".into(),
        state: SessionState::Working,
        current_tool: Some("Bash".into()),
        project_path: None,
        updated_at: Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
    }));
    assert_eq!(app.sessions[0].state, SessionState::Working);

    let mut stale = session("a", "%1");
    stale.updated_at = Some(Utc.with_ymd_and_hms(2026, 5, 1, 11, 0, 0).unwrap());
    app.update(Msg::Discovered(vec![stale]));
    assert_eq!(app.sessions[0].state, SessionState::Working);
}

#[test]
fn test_kill_removes_session_and_selects_neighbour() {
    let (temp, mut app) = ready(vec![session("a", "%1"), session("b", "%2")]);
    press(&mut app, KeyCode::Char('p'));
    assert!(app.stores.sidebar.snapshot().is_pinned("session:a"));

    assert_eq!(
        press(&mut app, KeyCode::Char('x')),
        vec![Cmd::Kill {
            pane_id: "%1".into()
        }]
    );
    let cmds = app.update(Msg::Killed {
        pane_id: "%1".into(),
    });
    assert_eq!(app.sessions.len(), 1);
    assert_eq!(selected_pane(&app), "%2");
    assert_eq!(cmds, vec![resize("%2"), capture("%2")]);

    let reloaded = herd_core::SidebarStore::load(&temp.path().join(".herd/sidebar.json"));
    assert!(!reloaded.snapshot().is_pinned("session:a"));
}

#[test]
fn test_quit_restores_every_window() {
    let (_temp, mut app) = ready(vec![session("a", "%1"), session("b", "%2")]);
    let cmds = press(&mut app, KeyCode::Char('q'));
    assert!(app.should_quit);
    assert_eq!(
        cmds,
        vec![
            Cmd::RestoreSize {
                pane_id: "%1".into()
            },
            Cmd::RestoreSize {
                pane_id: "%2".into()
            },
        ]
    );
}

#[test]
fn test_insert_mode_forwards_until_ctrl_h() {
    let (_temp, mut app) = ready(vec![session("a", "%1")]);
    press(&mut app, KeyCode::Char('i'));
    assert!(app.insert);

    assert_eq!(
        press(&mut app, KeyCode::Char('q')),
        vec![
            Cmd::SendLiteral {
                pane_id: "%1".into(),
                text: "q".into()
            },
            capture("%1"),
        ]
    );
    assert!(!app.should_quit);
    assert_eq!(
        app.update(Msg::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)))[0],
        Cmd::SendKey {
            pane_id: "%1".into(),
            name: "C-c".into()
        }
    );

    app.update(Msg::Key(KeyEvent::new(KeyCode::Char('h'), KeyModifiers::CONTROL)));
    assert!(!app.insert);
}

#[test]
fn test_forward_failure_leaves_insert_mode() {
    let (_temp, mut app) = ready(vec![session("a", "%1")]);
    press(&mut app, KeyCode::Char('i'));
    app.update(Msg::ActionFailed {
        action: Action::SendKeys,
        error: "pane gone".into(),
    });
    assert!(!app.insert);
    assert!(app.status_text().is_some_and(|s| s.contains("pane gone")));
}

#[test]
fn test_pin_moves_session_to_top_and_keeps_selection() {
    let (_temp, mut app) = ready(vec![session("a", "%1"), session("b", "%2")]);
    press(&mut app, KeyCode::Char('j'));
    let cmds = press(&mut app, KeyCode::Char('p'));
    assert!(cmds.is_empty());
    assert_eq!(app.sessions[0].pane_id, "%2");
    assert_eq!(app.selected, 0);

    press(&mut app, KeyCode::Char('p'));
    assert!(!app.stores.sidebar.snapshot().is_pinned("session:b"));
}

#[test]
fn test_move_reorders_within_unpinned() {
    let (_temp, mut app) = ready(vec![session("a", "%1"), session("b", "%2")]);
    let cmds = press(&mut app, KeyCode::Char('J'));
    assert_eq!(app.sessions[1].pane_id, "%1");
    assert_eq!(app.selected, 1);
    assert_eq!(cmds, vec![resize("%1"), capture("%1")]);
    assert_eq!(
        app.stores.sidebar.snapshot().order,
        vec!["session:b".to_string(), "session:a".to_string()]
    );
}

#[test]
fn test_group_assign_collapse_and_expand() {
    let (_temp, mut app) = ready(vec![
        session("a", "%1"),
        session("b", "%2"),
        session("c", "%3"),
    ]);
    press(&mut app, KeyCode::Char('g'));
    type_text(&mut app, "infra");
    press(&mut app, KeyCode::Enter);
    press(&mut app, KeyCode::Char('j'));
    press(&mut app, KeyCode::Char('j'));
    press(&mut app, KeyCode::Char('g'));
    type_text(&mut app, "infra");
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.stores.groups.all().len(), 2);

    press(&mut app, KeyCode::Tab);
    assert_eq!(app.cursor_on_group.as_deref(), Some("infra"));
    // Header plus the ungrouped row.
    assert_eq!(app.view_items().len(), 2);

    // Cursor stops on the collapsed header, then moves to the row below.
    press(&mut app, KeyCode::Char('j'));
    assert_eq!(app.cursor_on_group, None);
    assert_eq!(selected_pane(&app), "%2");
    press(&mut app, KeyCode::Char('k'));
    assert_eq!(app.cursor_on_group.as_deref(), Some("infra"));

    press(&mut app, KeyCode::Char(' '));
    assert_eq!(app.cursor_on_group, None);
    assert_eq!(app.view_items().len(), 4);
}

#[test]
fn test_empty_rename_clears_custom_name() {
    let (_temp, mut app) = ready(vec![session("a", "%1")]);
    press(&mut app, KeyCode::Char('R'));
    type_text(&mut app, "backend");
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.label_for(&app.sessions[0]), "backend");

    press(&mut app, KeyCode::Char('R'));
    app.update(Msg::Key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)));
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.label_for(&app.sessions[0]), "work/a");
}

#[test]
fn test_click_selects_row_and_ignores_output_area() {
    let (_temp, mut app) = ready(vec![session("a", "%1"), session("b", "%2")]);
    assert!(click(&mut app, 60, 3).is_empty());
    assert_eq!(selected_pane(&app), "%1");

    // Rows are two lines tall below the one-line header.
    let cmds = click(&mut app, 4, 3);
    assert_eq!(selected_pane(&app), "%2");
    assert_eq!(cmds, vec![resize("%2"), capture("%2")]);
}

#[test]
fn test_long_list_scrolls_to_keep_selection_and_clicks_follow() {
    let sessions = (0..30)
        .map(|i| session(&format!("s{i}"), &format!("%{i}")))
        .collect();
    let (_temp, mut app) = ready(sessions);
    assert_eq!(app.sidebar_scroll(), 0);

    for _ in 0..25 {
        press(&mut app, KeyCode::Char('j'));
    }
    assert_eq!(selected_pane(&app), "%25");
    // 38 list rows below the header and above the footer; row 25 ends at 52.
    assert_eq!(app.sidebar_scroll(), 14);

    click(&mut app, 4, 1);
    assert_eq!(selected_pane(&app), "%7");
}

#[test]
fn test_review_sends_feedback_and_returns_to_normal() {
    let (_temp, mut app) = ready(vec![session("a", "%1")]);
    press(&mut app, KeyCode::Char('d'));
    type_text(&mut app, "use a map");
    let cmds = press(&mut app, KeyCode::Enter);
    assert_eq!(
        cmds[0],
        Cmd::SendFeedback {
            pane_id: "%1".into(),
            text: "use a map".into()
        }
    );
    assert!(app.mode.is_normal());
}

#[test]
fn test_picker_launches_chosen_project() {
    let (_temp, mut app) = ready(vec![session("a", "%1")]);
    let cmds = press(&mut app, KeyCode::Char('n'));
    assert_eq!(
        cmds,
        vec![Cmd::ScanProjects {
            existing: vec!["/work/a".into()]
        }]
    );
    app.update(Msg::ProjectsScanned(vec!["/work/a".into(), "/work/b".into()]));
    type_text(&mut app, "b");
    let cmds = press(&mut app, KeyCode::Enter);
    assert_eq!(
        cmds.last(),
        Some(&Cmd::Launch {
            path: "/work/b".into()
        })
    );
    assert!(app.mode.is_normal());
}

#[test]
fn test_worktree_choice_switches_to_running_session() {
    let mut other = session("b", "%2");
    other.project_path = "/wt/feature/src".into();
    let mut first = session("a", "%1");
    first.git_root = "/repo".into();
    let (_temp, mut app) = ready(vec![first, other]);

    assert_eq!(
        press(&mut app, KeyCode::Char('w')),
        vec![Cmd::ListWorktrees {
            repo_root: "/repo".into()
        }]
    );
    app.update(Msg::WorktreesListed {
        repo_root: "/repo".into(),
        worktrees: vec![
            Worktree {
                path: "/repo".into(),
                is_main: true,
                ..Worktree::default()
            },
            Worktree {
                path: "/wt/feature".into(),
                ..Worktree::default()
            },
            Worktree {
                path: "/wt/fresh".into(),
                ..Worktree::default()
            },
        ],
    });
    press(&mut app, KeyCode::Char('j'));
    let cmds = press(&mut app, KeyCode::Enter);
    assert_eq!(selected_pane(&app), "%2");
    assert!(cmds.contains(&resize("%2")));

    press(&mut app, KeyCode::Char('k'));
    press(&mut app, KeyCode::Char('w'));
    app.update(Msg::WorktreesListed {
        repo_root: "/repo".into(),
        worktrees: vec![Worktree {
            path: "/wt/fresh".into(),
            ..Worktree::default()
        }],
    });
    let cmds = press(&mut app, KeyCode::Enter);
    assert_eq!(
        cmds.last(),
        Some(&Cmd::Launch {
            path: "/wt/fresh".into()
        })
    );
}

#[test]
fn test_selection_protocol_against_control_plane() {
    use std::sync::Arc;

    use herd_core::testing::{ControlCall, MockControlPlane, StaticGit};
    use herd_core::{Discovery, GitProbe, StateStore};

    use crate::runtime::{execute, Services};

    let (temp, mut app) = ready(vec![session("a", "%1"), session("b", "%2")]);
    let storage = StorageConfig::with_root(temp.path().join(".herd"));
    let control = Arc::new(MockControlPlane::new());
    control.set_capture("%2", "two\n\n");
    let git: Arc<dyn GitProbe> = Arc::new(StaticGit::default());
    let services = Services {
        control: control.clone(),
        git: Arc::clone(&git),
        discovery: Discovery::new(StateStore::new(storage.sessions_dir()), control.clone(), git),
        storage,
        config: Config::default(),
        herd_binary: "herd".to_string(),
        home: None,
    };

    for cmd in press(&mut app, KeyCode::Down) {
        if let Some(msg) = execute(&cmd, &services) {
            app.update(msg);
        }
    }
    assert_eq!(
        control.calls(),
        vec![
            ControlCall::Resize {
                pane_id: "%2".into(),
                width: 87,
                height: 37
            },
            ControlCall::Capture {
                pane_id: "%2".into(),
                lines: 2000
            },
        ]
    );
    assert_eq!(app.output, "two");
    assert_eq!(app.scroll_from_bottom, 0);
}
