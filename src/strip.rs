//! Removal of `// filepath:` annotation lines.
//!
//! `combine` writes an annotation as the first line of every fenced block.
//! After a document has been synced back into the tree those lines end up in
//! the source files; this module strips them again.

use crate::errors::SyncError;
use crate::filewalker::{WalkFilter, collect_files};
use crate::utils::normalize_extension;
use anyhow::{Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Extensions processed when none are given.
pub const DEFAULT_STRIP_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "md"];

static ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*// filepath:[ \t]*([^\r\n]*)(?:\r?\n|\z)")
        .expect("annotation pattern is valid")
});

pub struct StripOptions {
    pub project_root: PathBuf,
    /// Directory to clean, relative to `project_root`.
    pub scan_dir: PathBuf,
    /// Lowercase extensions without the dot.
    pub extensions: Vec<String>,
    /// Only annotations whose path mentions this segment are removed. Empty
    /// removes every annotation.
    pub source_root: String,
}

impl StripOptions {
    pub fn default_extensions() -> Vec<String> {
        DEFAULT_STRIP_EXTENSIONS
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StripSummary {
    pub processed: usize,
    pub modified: usize,
    pub skipped: usize,
    pub errors: usize,
}

fn mentions_source_root(path: &str, source_root: &str) -> bool {
    if source_root.is_empty() {
        return true;
    }
    let segment = format!("{source_root}/");
    path.starts_with(&segment) || path.contains(&format!("/{segment}"))
}

/// Returns `text` without its filepath annotations, or `None` if there was
/// nothing to remove.
pub fn strip_annotations(text: &str, source_root: &str) -> Option<String> {
    let updated = ANNOTATION_RE.replace_all(text, |caps: &Captures| {
        if mentions_source_root(caps[1].trim(), source_root) {
            String::new()
        } else {
            caps[0].to_string()
        }
    });

    if updated == text {
        None
    } else {
        Some(updated.into_owned())
    }
}

enum StripResult {
    Modified,
    Unchanged,
}

async fn strip_file(path: &Path, source_root: &str) -> Result<StripResult, SyncError> {
    let bytes = fs::read(path).await.map_err(|source| SyncError::ReadFailure {
        path: path.to_path_buf(),
        source,
    })?;

    let text = String::from_utf8(bytes).map_err(|_| SyncError::DecodeFailure(path.to_path_buf()))?;

    match strip_annotations(&text, source_root) {
        Some(updated) => {
            fs::write(path, updated)
                .await
                .map_err(|source| SyncError::WriteFailure {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(StripResult::Modified)
        }
        None => Ok(StripResult::Unchanged),
    }
}

/// Strips annotations from every matching file below the scan directory.
pub async fn run_strip(options: &StripOptions) -> Result<StripSummary> {
    let scan_dir = options.project_root.join(&options.scan_dir);
    if !scan_dir.is_dir() {
        return Err(SyncError::SourceDirMissing(scan_dir).into());
    }

    println!("Starting to remove filepath comments...\n");

    let filter = WalkFilter {
        extensions: options.extensions.clone(),
        ..WalkFilter::default()
    };
    let entries = collect_files(&scan_dir, &filter)
        .with_context(|| format!("Failed to walk {}", scan_dir.display()))?;

    let mut summary = StripSummary::default();

    for entry in entries {
        let path = entry.path();
        let rel_path = path.strip_prefix(&scan_dir).unwrap_or(path).display();
        summary.processed += 1;

        match strip_file(path, &options.source_root).await {
            Ok(StripResult::Modified) => {
                println!("✓ Removed filepath comment from: {rel_path}");
                summary.modified += 1;
            }
            Ok(StripResult::Unchanged) => debug!("No annotation in {rel_path}"),
            Err(SyncError::DecodeFailure(_)) => {
                warn!("Skipping non-UTF-8 file {}", path.display());
                println!("✗ Skipping binary file: {rel_path}");
                summary.skipped += 1;
            }
            Err(err) => {
                println!("✗ Error processing {rel_path}: {err}");
                summary.errors += 1;
            }
        }
    }

    println!(
        "\nDone! Processed {} files ({} modified, {} skipped, {} errors).",
        summary.processed, summary.modified, summary.skipped, summary.errors
    );

    Ok(summary)
}
