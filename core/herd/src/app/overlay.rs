//! State for the modal sub-views: text prompts, the project picker and the
//! worktree list.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use herd_core::{filter_projects, Worktree};

/// Result of feeding one key to a modal sub-view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Cancel,
    Submit(String),
}

/// Single-line text input. Editing happens at the end of the line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub value: String,
}

impl Prompt {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Returns `Submit` with the trimmed value on Enter and `Cancel` on Esc.
    pub fn handle_key(&mut self, key: &KeyEvent) -> Outcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Outcome::Cancel,
            KeyCode::Enter => Outcome::Submit(self.value.trim().to_string()),
            KeyCode::Backspace => {
                self.value.pop();
                Outcome::Pending
            }
            KeyCode::Char('u') if ctrl => {
                self.value.clear();
                Outcome::Pending
            }
            KeyCode::Char(c) if !ctrl => {
                self.value.push(c);
                Outcome::Pending
            }
            _ => Outcome::Pending,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Picker {
    pub query: Prompt,
    pub projects: Vec<String>,
    pub selected: usize,
    pub loading: bool,
}

impl Picker {
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn set_projects(&mut self, projects: Vec<String>) {
        self.projects = projects;
        self.loading = false;
        self.clamp();
    }

    pub fn filtered(&self) -> Vec<&String> {
        filter_projects(&self.projects, &self.query.value)
    }

    /// Typed text that should be treated as a directory path.
    pub fn typed_path(&self) -> Option<&str> {
        let typed = self.query.value.trim();
        (typed.starts_with('/') || typed.starts_with('~')).then_some(typed)
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> Outcome {
        match key.code {
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                Outcome::Pending
            }
            KeyCode::Down => {
                self.selected += 1;
                self.clamp();
                Outcome::Pending
            }
            _ => match self.query.handle_key(key) {
                Outcome::Submit(_) => match self.choice() {
                    Some(path) => Outcome::Submit(path),
                    None => Outcome::Pending,
                },
                Outcome::Pending => {
                    self.clamp();
                    Outcome::Pending
                }
                Outcome::Cancel => Outcome::Cancel,
            },
        }
    }

    fn choice(&self) -> Option<String> {
        if let Some(path) = self.typed_path() {
            return Some(path.to_string());
        }
        self.filtered().get(self.selected).map(|p| p.to_string())
    }

    fn clamp(&mut self) {
        let len = self.filtered().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}

#[derive(Debug, Clone)]
pub struct WorktreeList {
    pub repo_root: String,
    pub worktrees: Vec<Worktree>,
    pub selected: usize,
}

impl WorktreeList {
    pub fn new(repo_root: String, worktrees: Vec<Worktree>) -> Self {
        let worktrees = worktrees.into_iter().filter(|w| !w.is_bare).collect();
        Self {
            repo_root,
            worktrees,
            selected: 0,
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> Outcome {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => Outcome::Cancel,
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                Outcome::Pending
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.worktrees.len() {
                    self.selected += 1;
                }
                Outcome::Pending
            }
            KeyCode::Enter => match self.worktrees.get(self.selected) {
                Some(worktree) => Outcome::Submit(worktree.path.clone()),
                None => Outcome::Cancel,
            },
            _ => Outcome::Pending,
        }
    }
}
