//! Candidate project directories for launching a new session.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Immediate, non-hidden subdirectories of each of `roots`, plus the
/// `existing` session paths. Deduplicated and sorted. Unreadable roots are
/// skipped.
pub fn scan_projects(roots: &[PathBuf], existing: &[String]) -> Vec<String> {
    let mut projects: BTreeSet<String> = existing
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect();

    for root in roots {
        let entries = WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok());
        for entry in entries {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if entry.file_type().is_dir() && !hidden {
                projects.insert(entry.path().to_string_lossy().into_owned());
            }
        }
    }

    projects.into_iter().collect()
}

/// Case-insensitive substring filter over project paths.
pub fn filter_projects<'a>(projects: &'a [String], query: &str) -> Vec<&'a String> {
    let query = query.trim().to_lowercase();
    projects
        .iter()
        .filter(|p| query.is_empty() || p.to_lowercase().contains(&query))
        .collect()
}

/// Replaces a leading `home` with `~` for display.
pub fn shorten_path(path: &str, home: Option<&Path>) -> String {
    let Some(home) = home.map(|h| h.to_string_lossy()) else {
        return path.to_string();
    };
    match path.strip_prefix(home.as_ref()) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("~{rest}"),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_lists_visible_child_dirs_sorted() {
        let temp = TempDir::new().unwrap();
        for dir in ["zeta", "alpha", ".hidden", "alpha/nested"] {
            std::fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        std::fs::write(temp.path().join("file.txt"), "x").unwrap();

        let existing = vec!["/elsewhere/proj".to_string(), String::new()];
        let projects = scan_projects(&[temp.path().to_path_buf()], &existing);

        let root = temp.path().to_string_lossy();
        assert_eq!(
            projects,
            vec![
                "/elsewhere/proj".to_string(),
                format!("{root}/alpha"),
                format!("{root}/zeta"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let projects = scan_projects(&[PathBuf::from("/definitely/not/here")], &[]);
        assert!(projects.is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("a")).unwrap();
        let path = temp.path().join("a").to_string_lossy().into_owned();
        let projects = scan_projects(&[temp.path().to_path_buf()], &[path.clone()]);
        assert_eq!(projects, vec![path]);
    }

    #[test]
    fn test_filter_and_shorten() {
        let projects = vec!["/home/u/dev/Herd".to_string(), "/srv/api".to_string()];
        assert_eq!(filter_projects(&projects, "herd"), vec![&projects[0]]);
        assert_eq!(filter_projects(&projects, "").len(), 2);

        let home = Path::new("/home/u");
        assert_eq!(shorten_path("/home/u/dev/Herd", Some(home)), "~/dev/Herd");
        assert_eq!(shorten_path("/home/u", Some(home)), "~");
        assert_eq!(shorten_path("/home/user2/x", Some(home)), "/home/user2/x");
        assert_eq!(shorten_path("/srv/api", None), "/srv/api");
    }
}
