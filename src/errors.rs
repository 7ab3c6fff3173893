//! Error types for sync and strip runs.

use std::path::PathBuf;

/// Failures that can occur while syncing a changes document or stripping
/// annotations.
///
/// Only [`SyncError::InputMissing`] and [`SyncError::SourceDirMissing`] end a
/// run. The rest are reported per item and counted.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("changes file not found at {}", .0.display())]
    InputMissing(PathBuf),

    #[error("no file blocks found in {}", .0.display())]
    NoMatchesFound(PathBuf),

    #[error("failed to write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("target path {0:?} is outside the source root {1:?}")]
    PathOutsideRoot(String, String),

    #[error("{} is not valid UTF-8", .0.display())]
    DecodeFailure(PathBuf),

    #[error("source directory not found: {}", .0.display())]
    SourceDirMissing(PathBuf),
}

impl SyncError {
    /// Whether the error ends the whole run rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::InputMissing(_) | SyncError::SourceDirMissing(_)
        )
    }
}

/// Map an error to the process exit code.
///
/// A missing changes file is reported but is not an error exit.
pub fn exit_code(error: &SyncError) -> u8 {
    match error {
        SyncError::InputMissing(_) => 0,
        SyncError::NoMatchesFound(_) => 0,
        SyncError::SourceDirMissing(_) => 1,
        SyncError::WriteFailure { .. } => 1,
        SyncError::ReadFailure { .. } => 1,
        SyncError::PathOutsideRoot(..) => 1,
        SyncError::DecodeFailure(_) => 1,
    }
}
