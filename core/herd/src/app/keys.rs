//! Translation of terminal key events into tmux `send-keys` input.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Forward {
    /// A tmux key name such as `Enter` or `C-c`.
    Named(String),
    /// Text typed literally (`send-keys -l`).
    Literal(String),
}

/// `Ctrl-h` leaves insert mode and is never forwarded.
pub fn is_exit_insert(key: &KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char(c) => ctrl && c.eq_ignore_ascii_case(&'h'),
        KeyCode::Backspace => ctrl,
        _ => false,
    }
}

pub fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c'))
}

pub fn forward_for(key: &KeyEvent) -> Option<Forward> {
    if is_exit_insert(key) {
        return None;
    }
    let named = |name: &str| Some(Forward::Named(name.to_string()));
    match key.code {
        KeyCode::Enter => named("Enter"),
        KeyCode::Backspace => named("BSpace"),
        KeyCode::Delete => named("DC"),
        KeyCode::Tab => named("Tab"),
        KeyCode::BackTab => named("BTab"),
        KeyCode::Up => named("Up"),
        KeyCode::Down => named("Down"),
        KeyCode::Left => named("Left"),
        KeyCode::Right => named("Right"),
        KeyCode::Home => named("Home"),
        KeyCode::End => named("End"),
        KeyCode::PageUp => named("PPage"),
        KeyCode::PageDown => named("NPage"),
        KeyCode::Esc => named("Escape"),
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            match c.to_ascii_lowercase() {
                'i' => named("Tab"),
                'm' => named("Enter"),
                lower @ 'a'..='z' => Some(Forward::Named(format!("C-{lower}"))),
                _ => None,
            }
        }
        KeyCode::Char(' ') => named("Space"),
        KeyCode::Char(c) => Some(Forward::Literal(c.to_string())),
        _ => None,
    }
}
