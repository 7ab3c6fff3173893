//! Change-block parsing for sync documents.
//!
//! A sync document embeds zero or more blocks of this shape:
//!
//! ````text
//! --- START OF MODIFIED FILE src/example/file.ts ---
//! ```typescript
//! // code content
//! ```
//! --- END OF MODIFIED FILE src/example/file.ts ---
//! ````
//!
//! Marker lines may additionally be wrapped in their own ```` ```markdown ````
//! fences. The document is scanned line by line; anything outside a block is
//! ignored.

use log::{debug, warn};

pub const START_MARKER: &str = "START OF MODIFIED FILE";
pub const END_MARKER: &str = "END OF MODIFIED FILE";

/// One extracted (path, content) unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBlock {
    pub target_path: String,
    pub raw_text: String,
    pub cleaned_text: String,
}

impl ChangeBlock {
    pub fn new(target_path: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let cleaned_text = clean_content(&raw_text);
        Self {
            target_path: target_path.into(),
            raw_text,
            cleaned_text,
        }
    }
}

#[derive(Debug)]
enum ScanState {
    AwaitingStart {
        /// Inside a fence that is not part of any block.
        in_outer_fence: bool,
    },
    AwaitingFence {
        path: String,
        /// The start marker sat inside a wrapper fence that is still open.
        wrapped: bool,
    },
    InFencedBlock {
        path: String,
        fence_len: usize,
        nested: usize,
        lines: Vec<String>,
        /// Index of the first end marker for this path seen before any
        /// closing fence. Only used if the fence is never closed.
        end_candidate: Option<usize>,
    },
    AwaitingEnd {
        path: String,
        raw_text: String,
        wrapper_open: bool,
    },
}

/// A line consisting of a backtick fence, with its length and info string.
struct Fence<'a> {
    len: usize,
    info: &'a str,
}

fn parse_fence(line: &str) -> Option<Fence<'_>> {
    let trimmed = line.trim();
    let len = trimmed.chars().take_while(|&c| c == '`').count();
    if len < 3 {
        return None;
    }
    let info = trimmed[len..].trim();
    if info.contains('`') {
        return None;
    }
    Some(Fence { len, info })
}

/// Pulls the target path token out of a start marker line.
fn marker_path(line: &str) -> Option<String> {
    let idx = line.find(START_MARKER)?;
    path_token(&line[idx + START_MARKER.len()..])
}

/// Path of a line that is nothing but `--- <marker> <path> ---`.
///
/// Stricter than [`marker_path`]; used inside fenced content, where the
/// marker phrase may legitimately appear in code.
fn marker_line_path(line: &str, marker: &str) -> Option<String> {
    let rest = line
        .trim_start_matches(|c: char| c == '-' || c.is_whitespace())
        .strip_prefix(marker)?;
    let mut tokens = rest.split_whitespace();
    let path = path_token(tokens.next()?)?;
    if tokens.all(|t| t.chars().all(|c| c == '-')) {
        Some(path)
    } else {
        None
    }
}

fn path_token(rest: &str) -> Option<String> {
    let token = rest.split_whitespace().next()?;
    let token = token.trim_end_matches('-').trim_matches('`').trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Scans `document` for change blocks and returns them in document order.
///
/// Malformed blocks are logged and dropped; they never stop the scan.
pub fn parse_change_blocks(document: &str) -> Vec<ChangeBlock> {
    let mut blocks = Vec::new();
    let mut state = ScanState::AwaitingStart {
        in_outer_fence: false,
    };

    for (idx, line) in document.lines().enumerate() {
        let line_no = idx + 1;
        state = match state {
            ScanState::AwaitingStart { in_outer_fence } => {
                if line.contains(START_MARKER) {
                    match marker_path(line) {
                        Some(path) => {
                            debug!("Block start for {path} at line {line_no}");
                            ScanState::AwaitingFence {
                                path,
                                wrapped: in_outer_fence,
                            }
                        }
                        None => {
                            warn!("Start marker without a path at line {line_no}");
                            ScanState::AwaitingStart { in_outer_fence }
                        }
                    }
                } else if parse_fence(line).is_some() {
                    ScanState::AwaitingStart {
                        in_outer_fence: !in_outer_fence,
                    }
                } else {
                    ScanState::AwaitingStart { in_outer_fence }
                }
            }

            ScanState::AwaitingFence { path, wrapped } => {
                if line.trim().is_empty() {
                    ScanState::AwaitingFence { path, wrapped }
                } else if let Some(fence) = parse_fence(line) {
                    if wrapped && fence.info.is_empty() {
                        ScanState::AwaitingFence {
                            path,
                            wrapped: false,
                        }
                    } else {
                        ScanState::InFencedBlock {
                            path,
                            fence_len: fence.len,
                            nested: 0,
                            lines: Vec::new(),
                            end_candidate: None,
                        }
                    }
                } else if let Some(next) = marker_path(line) {
                    warn!("Block for {path} has no content fence; restarting at line {line_no}");
                    ScanState::AwaitingFence {
                        path: next,
                        wrapped: false,
                    }
                } else {
                    warn!("Block for {path} has no content fence (line {line_no}); skipping it");
                    ScanState::AwaitingStart {
                        in_outer_fence: false,
                    }
                }
            }

            ScanState::InFencedBlock {
                path,
                fence_len,
                mut nested,
                mut lines,
                mut end_candidate,
            } => {
                let fence = parse_fence(line);
                match &fence {
                    Some(f) if f.len >= fence_len && f.info.is_empty() && nested == 0 => {
                        ScanState::AwaitingEnd {
                            path,
                            raw_text: join_lines(&lines),
                            wrapper_open: false,
                        }
                    }
                    _ => {
                        if let Some(f) = fence.as_ref().filter(|f| f.len == fence_len) {
                            nested = if f.info.is_empty() {
                                nested.saturating_sub(1)
                            } else {
                                nested + 1
                            };
                        }

                        let next_start = end_candidate
                            .and(marker_line_path(line, START_MARKER));
                        if let (Some(cut), Some(next)) = (end_candidate, next_start) {
                            warn!("Block for {path} has no closing fence; ending it at its end marker");
                            blocks.push(unfenced_block(path, lines, cut));
                            ScanState::AwaitingFence {
                                path: next,
                                wrapped: false,
                            }
                        } else {
                            if end_candidate.is_none()
                                && marker_line_path(line, END_MARKER).as_deref() == Some(path.as_str())
                            {
                                debug!("End marker for {path} inside its fence at line {line_no}");
                                end_candidate = Some(lines.len());
                            }
                            lines.push(line.to_string());
                            ScanState::InFencedBlock {
                                path,
                                fence_len,
                                nested,
                                lines,
                                end_candidate,
                            }
                        }
                    }
                }
            }

            ScanState::AwaitingEnd {
                path,
                raw_text,
                wrapper_open,
            } => {
                if line.contains(END_MARKER) {
                    debug!("Block end for {path} at line {line_no}");
                    blocks.push(ChangeBlock::new(path, raw_text));
                    ScanState::AwaitingStart {
                        in_outer_fence: wrapper_open,
                    }
                } else if line.trim().is_empty() {
                    ScanState::AwaitingEnd {
                        path,
                        raw_text,
                        wrapper_open,
                    }
                } else if parse_fence(line).is_some() {
                    ScanState::AwaitingEnd {
                        path,
                        raw_text,
                        wrapper_open: !wrapper_open,
                    }
                } else if let Some(next) = marker_path(line) {
                    warn!("Block for {path} has no end marker; dropped at line {line_no}");
                    ScanState::AwaitingFence {
                        path: next,
                        wrapped: wrapper_open,
                    }
                } else {
                    warn!("Unexpected text after block for {path} at line {line_no}; block dropped");
                    ScanState::AwaitingStart {
                        in_outer_fence: false,
                    }
                }
            }
        };
    }

    match state {
        ScanState::AwaitingStart { .. } => {}
        ScanState::InFencedBlock {
            path,
            lines,
            end_candidate: Some(cut),
            ..
        } => {
            warn!("Block for {path} has no closing fence; ending it at its end marker");
            blocks.push(unfenced_block(path, lines, cut));
        }
        ScanState::AwaitingFence { path, .. }
        | ScanState::InFencedBlock { path, .. }
        | ScanState::AwaitingEnd { path, .. } => {
            warn!("Document ended inside the block for {path}; block dropped");
        }
    }

    blocks
}

/// Builds a block whose fence was never closed from the lines before its end
/// marker, dropping wrapper fences and blank lines left just above it.
fn unfenced_block(path: String, mut lines: Vec<String>, cut: usize) -> ChangeBlock {
    lines.truncate(cut);
    while lines
        .last()
        .is_some_and(|l| l.trim().is_empty() || parse_fence(l).is_some())
    {
        lines.pop();
    }
    ChangeBlock::new(path, join_lines(&lines))
}

fn join_lines(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    if !lines.is_empty() {
        text.push('\n');
    }
    text
}

/// Normalizes extracted content before it is written to disk.
///
/// Removes stray trailing fences, converts line endings to `\n`, strips
/// trailing whitespace from every line and leaves exactly one final newline.
/// Applying it twice gives the same result as applying it once.
pub fn clean_content(text: &str) -> String {
    let mut body = text.trim_end();
    while let Some(stripped) = body.strip_suffix("```") {
        body = stripped.trim_end();
    }

    let normalized = body.replace("\r\n", "\n").replace('\r', "\n");

    let mut cleaned = normalized
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    let keep = cleaned.trim_end_matches('\n').len();
    cleaned.truncate(keep);
    cleaned.push('\n');
    cleaned
}
