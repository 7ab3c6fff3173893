use crate::utils::{FILEPATH_ANNOTATION, fence_for, get_language_tag};
use anyhow::{Context, Result};
use content_inspector::{ContentType, inspect};
use log::{debug, warn};
use memmap2::MmapOptions;
use std::borrow::Cow;
use std::fs::File as StdFile;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Renders collected source files as one Markdown document.
pub struct MarkdownWriter<W: AsyncWrite + Unpin> {
    writer: BufWriter<W>,
    annotate: bool,
    current_dir: Option<PathBuf>,
    directories: usize,
}

impl<W: AsyncWrite + Unpin> MarkdownWriter<W> {
    pub fn new(writer: BufWriter<W>, annotate: bool) -> Self {
        Self {
            writer,
            annotate,
            current_dir: None,
            directories: 0,
        }
    }

    /// Number of directory headings written so far.
    pub fn directories(&self) -> usize {
        self.directories
    }

    pub async fn write_title(&mut self, title: &str, generated_at: &str) -> Result<()> {
        let header = format!(
            "# {title}\n\nGenerated documentation of all source files in the project ({generated_at}).\n\n"
        );
        self.writer
            .write_all(header.as_bytes())
            .await
            .context("Failed to write document title")
    }

    /// Writes one file as a section, preceded by a directory heading whenever
    /// the file's directory differs from the previous entry's.
    pub async fn write_entry(&mut self, path: &Path, project_root: &Path) -> Result<()> {
        let rel_path = path.strip_prefix(project_root).unwrap_or(path);
        let display_path = rel_path.to_string_lossy().replace('\\', "/");

        debug!("Writing file: {display_path}");

        let rel_dir = rel_path.parent().map(Path::to_path_buf).unwrap_or_default();
        if self.current_dir.as_ref() != Some(&rel_dir) {
            self.write_directory_heading(&rel_dir).await?;
            self.current_dir = Some(rel_dir);
        }

        let file_name = rel_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display_path.clone());

        self.writer
            .write_all(format!("### File: {file_name}\n\n**Path:** `{display_path}`\n\n").as_bytes())
            .await
            .with_context(|| format!("Failed to write heading for {display_path}"))?;

        let body = match read_source(path) {
            Ok(SourceContent::Binary) => {
                self.writer
                    .write_all(b"(binary file omitted)\n\n")
                    .await
                    .with_context(|| format!("Failed to write binary marker for {display_path}"))?;
                return Ok(());
            }
            Ok(SourceContent::Text(text)) => text,
            Err(err) => {
                warn!("Could not read {}: {err:#}", path.display());
                format!("// Error reading file: {err:#}\n")
            }
        };

        let fence = fence_for(&body);
        let mut block = format!("{fence}{}\n", get_language_tag(path));
        if self.annotate {
            block.push_str(FILEPATH_ANNOTATION);
            block.push_str(&display_path);
            block.push('\n');
        }
        block.push_str(&body);
        if !body.is_empty() && !body.ends_with('\n') {
            block.push('\n');
        }
        block.push_str(&fence);
        block.push_str("\n\n");

        self.writer
            .write_all(block.as_bytes())
            .await
            .with_context(|| format!("Failed to write content block for {display_path}"))?;

        debug!("Finished: {display_path}");
        Ok(())
    }

    async fn write_directory_heading(&mut self, rel_dir: &Path) -> Result<()> {
        let depth = rel_dir.components().count().saturating_sub(1);
        let shown = if rel_dir.as_os_str().is_empty() {
            ".".to_string()
        } else {
            rel_dir.to_string_lossy().replace('\\', "/")
        };
        let heading = format!("{} Directory: {shown}\n\n", "#".repeat(depth + 2));
        self.directories += 1;
        self.writer
            .write_all(heading.as_bytes())
            .await
            .with_context(|| format!("Failed to write directory heading for {shown}"))
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await.context("Failed to flush output")
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

enum SourceContent {
    Binary,
    Text(String),
}

fn read_source(path: &Path) -> Result<SourceContent> {
    let file =
        StdFile::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;

    let mmap = unsafe {
        MmapOptions::new()
            .map(&file)
            .with_context(|| format!("Failed to mmap file: {}", path.display()))?
    };

    if mmap.is_empty() {
        debug!("File '{}' is empty", path.display());
        return Ok(SourceContent::Text(String::new()));
    }

    let sample_size = std::cmp::min(8192, mmap.len());
    if inspect(&mmap[..sample_size]) == ContentType::BINARY {
        return Ok(SourceContent::Binary);
    }

    let text = match String::from_utf8_lossy(&mmap) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => {
            debug!("Invalid UTF-8 in {}, using lossy decode", path.display());
            s
        }
    };
    Ok(SourceContent::Text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    async fn render(root: &Path, files: &[&str], annotate: bool) -> String {
        let mut md = MarkdownWriter::new(BufWriter::new(Vec::new()), annotate);
        for file in files {
            md.write_entry(&root.join(file), root).await.unwrap();
        }
        md.flush().await.unwrap();
        String::from_utf8(md.into_inner()).unwrap()
    }

    #[tokio::test]
    async fn test_writes_sections_with_annotation() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/lib")).unwrap();
        fs::write(root.join("src/index.ts"), "export {};").unwrap();
        fs::write(root.join("src/lib/util.py"), "x = 1\n").unwrap();

        let out = render(root, &["src/index.ts", "src/lib/util.py"], true).await;

        assert!(out.contains("## Directory: src\n\n### File: index.ts\n\n**Path:** `src/index.ts`\n\n"));
        assert!(out.contains("```typescript\n// filepath: src/index.ts\nexport {};\n```\n"));
        assert!(out.contains("### Directory: src/lib\n\n"));
        assert!(out.contains("```python\n// filepath: src/lib/util.py\nx = 1\n```\n"));
    }

    #[tokio::test]
    async fn test_heading_written_once_per_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.md"), "a").unwrap();
        fs::write(root.join("src/b.md"), "b").unwrap();

        let out = render(root, &["src/a.md", "src/b.md"], false).await;
        assert_eq!(out.matches("Directory: src").count(), 1);
        assert!(!out.contains(FILEPATH_ANNOTATION));
    }

    #[tokio::test]
    async fn test_binary_and_backtick_content() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("blob.bin"), [0x00, 0xFF, 0xAA, 0x55]).unwrap();
        fs::write(root.join("README.md"), "```rust\nfn main() {}\n```\n").unwrap();

        let out = render(root, &["blob.bin", "README.md"], true).await;
        assert!(out.contains("**Path:** `blob.bin`\n\n(binary file omitted)"));
        assert!(out.contains("````markdown\n// filepath: README.md\n```rust"));
        assert!(out.contains("```\n````\n"));
    }
}
