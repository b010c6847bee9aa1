//! The local paper library: listing, fuzzy lookup and deletion

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

/// All PDFs under `dir`, sorted. A missing directory is an empty library.
pub fn list_papers(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!(
        "{}/**/*.pdf",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::error!(dir = %dir.display(), error = %e, "bad library path");
            return Vec::new();
        }
    };
    let mut out: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(p) if p.is_file() => Some(p),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable library entry");
                None
            }
        })
        .collect();
    out.sort();
    out
}

/// Case-insensitive subsequence matcher: `rlhf` matches `RL from Human Feedback.pdf`
fn matcher(query: &str) -> Option<Regex> {
    let chars: Vec<String> = query
        .trim()
        .chars()
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    if chars.is_empty() {
        return None;
    }
    Regex::new(&format!("(?i){}", chars.join(".*?"))).ok()
}

/// Shortest match over all start positions as `(length, start)`
fn score(re: &Regex, name: &str) -> Option<(usize, usize)> {
    name.char_indices()
        .filter_map(|(i, _)| re.find_at(name, i))
        .map(|m| (m.len(), m.start()))
        .min()
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
    let read_dir = match fs::read_dir(dir) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot read directory");
            return;
        }
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => walk(&path, out),
            Ok(ft) if ft.is_file() => out.push(path),
            _ => {}
        }
    }
}

/// Files anywhere under `dir` whose name contains the query's characters in
/// order, best match first. A blank query matches nothing, so
/// [`delete_papers`] with a blank query removes no files.
pub fn fuzzy_find(query: &str, dir: &Path) -> Vec<PathBuf> {
    let Some(re) = matcher(query) else {
        return Vec::new();
    };
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut files = Vec::new();
    walk(dir, &mut files);

    let mut scored: Vec<((usize, usize), PathBuf)> = files
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            let s = score(&re, &name)?;
            Some((s, path))
        })
        .collect();
    scored.sort();

    scored
        .into_iter()
        .map(|(_, path)| std::path::absolute(&path).unwrap_or(path))
        .collect()
}

/// Remove every fuzzy match under `dir`; returns the files that were targeted
pub fn delete_papers(query: &str, dir: &Path) -> Vec<PathBuf> {
    let targets = fuzzy_find(query, dir);
    for path in &targets {
        match fs::remove_file(path) {
            Ok(()) => tracing::info!(path = %path.display(), "deleted"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "delete failed"),
        }
    }
    targets
}
