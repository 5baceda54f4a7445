//! Git metadata for session project paths.

use std::collections::HashMap;
use std::process::Command;

use crate::error::{HerdError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GitInfo {
    pub root: String,
    /// Empty on a detached HEAD or outside a repository.
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Worktree {
    pub path: String,
    pub branch: String,
    pub is_main: bool,
    pub is_bare: bool,
}

pub trait GitProbe: Send + Sync {
    fn info(&self, dir: &str) -> GitInfo;
    fn worktrees(&self, repo_root: &str) -> Result<Vec<Worktree>>;
}

/// Probe backed by the `git` CLI.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitProbe for GitCli {
    fn info(&self, dir: &str) -> GitInfo {
        let root = run_git(dir, &["rev-parse", "--show-toplevel"]).unwrap_or_default();
        let branch = run_git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
            .filter(|branch| branch != "HEAD")
            .unwrap_or_default();
        GitInfo { root, branch }
    }

    fn worktrees(&self, repo_root: &str) -> Result<Vec<Worktree>> {
        let output = Command::new("git")
            .args(["-C", repo_root, "worktree", "list", "--porcelain"])
            .output()
            .map_err(|e| HerdError::command("git worktree list", e.to_string()))?;
        if !output.status.success() {
            return Err(HerdError::command(
                "git worktree list",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_worktrees(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn run_git(dir: &str, args: &[&str]) -> Option<String> {
    let output = Command::new("git").arg("-C").arg(dir).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Parses `git worktree list --porcelain`. The first entry is the main
/// worktree.
pub fn parse_worktrees(output: &str) -> Vec<Worktree> {
    let mut worktrees = Vec::new();
    let mut current: Option<Worktree> = None;

    for line in output.lines() {
        if line.is_empty() {
            worktrees.extend(current.take());
            continue;
        }
        let entry = current.get_or_insert_with(Worktree::default);
        if let Some(path) = line.strip_prefix("worktree ") {
            entry.path = path.to_string();
        } else if let Some(branch) = line.strip_prefix("branch refs/heads/") {
            entry.branch = branch.to_string();
        } else if line == "bare" {
            entry.is_bare = true;
        }
    }
    worktrees.extend(current);

    if let Some(first) = worktrees.first_mut() {
        first.is_main = true;
    }
    worktrees
}

/// Per-pass memo so sessions sharing a project path cost one git lookup.
pub struct GitCache<'a> {
    probe: &'a dyn GitProbe,
    memo: HashMap<String, GitInfo>,
}

impl<'a> GitCache<'a> {
    pub fn new(probe: &'a dyn GitProbe) -> Self {
        Self {
            probe,
            memo: HashMap::new(),
        }
    }

    pub fn lookup(&mut self, dir: &str) -> GitInfo {
        if dir.is_empty() {
            return GitInfo::default();
        }
        if let Some(info) = self.memo.get(dir) {
            return info.clone();
        }
        let info = self.probe.info(dir);
        self.memo.insert(dir.to_string(), info.clone());
        info
    }
}
