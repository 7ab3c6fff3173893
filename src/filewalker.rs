use crate::utils::has_allowed_extension;
use anyhow::Result;
use ignore::{DirEntry, WalkBuilder};
use log::{debug, warn};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Directory names that are never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules"];

/// Filters applied while walking a source directory.
#[derive(Debug, Default, Clone)]
pub struct WalkFilter {
    /// Lowercase extensions without the dot. Empty means all files.
    pub extensions: Vec<String>,
    /// Only files whose name matches this pattern are kept.
    pub name_pattern: Option<Regex>,
    /// Additional gitignore-style file to honour.
    pub ignore_file: Option<PathBuf>,
}

/// Collects all files below `scan_dir` in sorted order, skipping hidden
/// entries and dependency folders and applying the given filters.
pub fn collect_files(scan_dir: &Path, filter: &WalkFilter) -> Result<Vec<DirEntry>> {
    let mut builder = WalkBuilder::new(scan_dir);

    builder
        .hidden(true)
        .ignore(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|e| e.depth() == 0 || !(is_hidden(e) || is_skipped_dir(e)));

    if let Some(ignore_path) = &filter.ignore_file {
        if let Some(err) = builder.add_ignore(ignore_path) {
            warn!("Could not load ignore file {}: {err}", ignore_path.display());
        }
    }

    let mut entries = Vec::new();

    for result in builder.build() {
        match result {
            Ok(entry) => {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if !has_allowed_extension(path, &filter.extensions) {
                    debug!("Skipping by extension: {}", path.display());
                    continue;
                }
                if !matches_name(path, filter.name_pattern.as_ref()) {
                    debug!("Skipping by name: {}", path.display());
                    continue;
                }
                entries.push(entry);
            }
            Err(err) => {
                warn!("Error walking path: {err}");
            }
        }
    }

    Ok(entries)
}

/// Determines if a file/folder is hidden (starts with a dot)
fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .path()
        .file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.starts_with('.'))
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|t| t.is_dir())
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn matches_name(path: &Path, pattern: Option<&Regex>) -> bool {
    match pattern {
        None => true,
        Some(re) => path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|name| re.is_match(name)),
    }
}
