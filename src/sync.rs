//! Writes parsed change blocks back into the project tree.

use crate::errors::SyncError;
use crate::parser::{ChangeBlock, END_MARKER, START_MARKER, parse_change_blocks};
use anyhow::{Context, Result};
use log::{debug, error, info};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Source root segment every target path must start with by default.
pub const DEFAULT_SOURCE_ROOT: &str = "src";

pub struct SyncOptions {
    /// The Markdown document holding the change blocks.
    pub input: PathBuf,
    /// Directory target paths are resolved against.
    pub project_root: PathBuf,
    /// First path segment every target must start with. Empty allows any
    /// relative path below `project_root`.
    pub source_root: String,
    /// List the planned writes without touching the filesystem.
    pub dry_run: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplySummary {
    pub written: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The document contained no change blocks.
    NoBlocks,
    /// The operator declined the confirmation prompt.
    Cancelled,
    /// Dry run listing this many blocks.
    DryRun(usize),
    Applied(ApplySummary),
}

/// Resolves a block's target path below `root_dir`.
///
/// Absolute paths, `..` segments and paths outside `source_root` are
/// rejected.
pub fn resolve_target(root_dir: &Path, target: &str, source_root: &str) -> Result<PathBuf, SyncError> {
    let outside = || SyncError::PathOutsideRoot(target.to_string(), source_root.to_string());

    let mut relative = PathBuf::new();
    for component in Path::new(target).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(outside());
            }
        }
    }

    let mut parts = relative.components();
    let first = parts.next().ok_or_else(outside)?;
    if !source_root.is_empty() && (first.as_os_str() != source_root || parts.next().is_none()) {
        return Err(outside());
    }

    Ok(root_dir.join(relative))
}

async fn apply_block(block: &ChangeBlock, root_dir: &Path, source_root: &str) -> Result<PathBuf, SyncError> {
    let full_path = resolve_target(root_dir, &block.target_path, source_root)?;

    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| SyncError::WriteFailure {
                path: full_path.clone(),
                source,
            })?;
    }

    fs::write(&full_path, block.cleaned_text.as_bytes())
        .await
        .map_err(|source| SyncError::WriteFailure {
            path: full_path.clone(),
            source,
        })?;

    Ok(full_path)
}

/// Writes every block in order, overwriting existing files.
///
/// A failing block is reported and counted; later blocks are still written.
pub async fn apply_change_blocks(blocks: &[ChangeBlock], root_dir: &Path, source_root: &str) -> ApplySummary {
    let mut summary = ApplySummary::default();

    for block in blocks {
        match apply_block(block, root_dir, source_root).await {
            Ok(path) => {
                debug!("Wrote {} bytes to {}", block.cleaned_text.len(), path.display());
                println!("✅ Synced: {}", block.target_path);
                summary.written += 1;
            }
            Err(err) => {
                error!("Sync failed for {}: {err}", block.target_path);
                println!("❌ Error syncing {}: {err}", block.target_path);
                summary.errors += 1;
            }
        }
    }

    summary
}

/// Reads the changes document, asks `confirm` and applies the blocks.
///
/// `confirm` sees the parsed blocks and is only called when there is
/// something to write.
pub async fn run_sync<F>(options: &SyncOptions, confirm: F) -> Result<SyncOutcome>
where
    F: FnOnce(&[ChangeBlock]) -> std::io::Result<bool>,
{
    if !options.input.is_file() {
        return Err(SyncError::InputMissing(options.input.clone()).into());
    }

    println!("Base directory: {}", options.project_root.display());
    println!("Changes file: {}\n", options.input.display());

    let content = fs::read_to_string(&options.input)
        .await
        .with_context(|| format!("Failed to read changes file: {}", options.input.display()))?;

    let blocks = parse_change_blocks(&content);
    info!("Found {} change block(s) in {}", blocks.len(), options.input.display());

    if blocks.is_empty() {
        println!("ℹ️  {}", SyncError::NoMatchesFound(options.input.clone()));
        print_guidance(&content);
        return Ok(SyncOutcome::NoBlocks);
    }

    println!("Files to sync:");
    for block in &blocks {
        println!("  {}", block.target_path);
    }
    println!();

    if options.dry_run {
        println!("[dry-run] {} file(s) would be written", blocks.len());
        return Ok(SyncOutcome::DryRun(blocks.len()));
    }

    if !confirm(&blocks).context("Failed to read confirmation")? {
        println!("Operation cancelled.");
        return Ok(SyncOutcome::Cancelled);
    }

    println!("Starting sync process...");
    let summary = apply_change_blocks(&blocks, &options.project_root, &options.source_root).await;
    print_summary(&summary);

    Ok(SyncOutcome::Applied(summary))
}

fn print_summary(summary: &ApplySummary) {
    println!("\nSync completed!");
    if summary.written > 0 {
        println!("✅ Successfully processed: {} files", summary.written);
    }
    if summary.errors > 0 {
        println!("❌ Errors: {}", summary.errors);
    }
}

fn print_guidance(content: &str) {
    let preview: String = content.chars().take(200).collect();
    println!("\nFirst 200 chars of the changes file:");
    println!("{}", preview.replace('\n', "\\n"));
    println!("\nExpected format:");
    println!("--- {START_MARKER} src/example/file.ts ---");
    println!("```typescript");
    println!("// Your code here");
    println!("```");
    println!("--- {END_MARKER} src/example/file.ts ---");
}
