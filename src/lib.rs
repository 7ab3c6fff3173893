//! # mdsync Library
//!
//! This crate can be used to:
//!
//! - Collect the files of a source directory into one Markdown document
//! - Write the modified files described in a Markdown changes document back
//!   into the project
//! - Strip the `// filepath:` annotations that the combined document embeds
//!
//! ## Usage
//!
//! ### To sync a changes document:
//!
//! A changes document holds one block per modified file:
//!
//! ````text
//! --- START OF MODIFIED FILE src/example/file.ts ---
//! ```typescript
//! // code content
//! ```
//! --- END OF MODIFIED FILE src/example/file.ts ---
//! ````
//!
//! ```rust,no_run
//! use mdsync::sync::{SyncOptions, run_sync};
//! use std::path::PathBuf;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let options = SyncOptions {
//!         input: PathBuf::from("scripts/changes.md"),
//!         project_root: std::env::current_dir()?,
//!         source_root: "src".to_string(),
//!         dry_run: false,
//!     };
//!
//!     run_sync(&options, |_blocks| Ok(true)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ### To parse blocks without touching the filesystem:
//!
//! ```rust
//! use mdsync::parse_change_blocks;
//!
//! let doc = "--- START OF MODIFIED FILE src/a.txt ---\n```\nhello   \n\n\n```\n--- END OF MODIFIED FILE src/a.txt ---\n";
//! let blocks = parse_change_blocks(doc);
//! assert_eq!(blocks[0].target_path, "src/a.txt");
//! assert_eq!(blocks[0].cleaned_text, "hello\n");
//! ```

pub mod cli;
pub mod errors;
pub mod filewalker;
pub mod parser;
pub mod prompt;
#[cfg(feature = "strip")]
pub mod strip;
pub mod sync;
pub mod utils;
pub mod writer;

pub use cli::{CombineOptions, Config, Mode};
pub use errors::SyncError;
pub use filewalker::collect_files;
pub use parser::{ChangeBlock, clean_content, parse_change_blocks};
pub use sync::{ApplySummary, SyncOutcome, apply_change_blocks, run_sync};
pub use writer::MarkdownWriter;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::BufWriter;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CombineSummary {
    pub files: usize,
    pub directories: usize,
}

/// Generate a Markdown file from the files of the scan directory
pub async fn run_combine(options: &CombineOptions) -> Result<CombineSummary> {
    let scan_dir = options.project_root.join(&options.scan_dir);
    if !scan_dir.is_dir() {
        return Err(SyncError::SourceDirMissing(scan_dir).into());
    }

    let mut entries: Vec<PathBuf> = collect_files(&scan_dir, &options.filter)?
        .into_iter()
        .map(|entry| entry.into_path())
        .filter(|path| *path != options.output_path)
        .collect();

    // Files of a directory come before its subdirectories.
    entries.sort_by(|a, b| a.parent().cmp(&b.parent()).then_with(|| a.cmp(b)));
    info!("Collected {} files from {}", entries.len(), scan_dir.display());

    if let Some(parent) = options.output_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let file = File::create(&options.output_path)
        .await
        .with_context(|| format!("Failed to create output: {}", options.output_path.display()))?;
    let mut md_writer = MarkdownWriter::new(BufWriter::new(file), options.annotate);

    let generated_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    md_writer.write_title(&options.title, &generated_at).await?;

    for path in &entries {
        md_writer.write_entry(path, &options.project_root).await?;
        let rel_path = path.strip_prefix(&options.project_root).unwrap_or(path);
        println!("Processed: {}", rel_path.display());
    }

    md_writer.flush().await?;
    debug!("Wrote {}", options.output_path.display());

    Ok(CombineSummary {
        files: entries.len(),
        directories: md_writer.directories(),
    })
}

/// Runs the subcommand selected in `config`.
pub async fn run(config: Config) -> Result<()> {
    match config.mode {
        Mode::Combine(options) => {
            let summary = run_combine(&options).await?;
            println!(
                "\nMarkdown file created: {} ({} files)",
                options.output_path.display(),
                summary.files
            );
        }
        Mode::Sync {
            options,
            assume_yes,
        } => {
            run_sync(&options, |_| {
                if assume_yes {
                    Ok(true)
                } else {
                    prompt::confirm_on_terminal(prompt::CONFIRM_PROMPT)
                }
            })
            .await?;
        }
        #[cfg(feature = "strip")]
        Mode::Strip(options) => {
            strip::run_strip(&options).await?;
        }
    }
    Ok(())
}
