//! Workspace option models, constants, and the top-level error type.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region Constants

/// Length of a generated temp directory name.
pub const N_LEN_TEMP_DIR_NAME: usize = 12;
/// Shortest path `remove_tree` accepts: `"/tmp/"` plus a generated name.
pub const N_LEN_REMOVE_PATH_MIN: usize = 17;
/// Default mode for directories created by this crate (umask still applies).
pub const N_MODE_DIR_DEFAULT: u32 = 0o777;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Filesystem step that failed inside a workspace operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFsOperation {
    /// Directory creation.
    CreateDir,
    /// Directory listing.
    ReadDir,
    /// Metadata lookup.
    Inspect,
    /// Single-file byte copy.
    CopyFile,
    /// Same-filesystem rename.
    Rename,
    /// File or symlink unlink.
    RemoveFile,
    /// Empty directory removal.
    RemoveDir,
    /// Whole-file read.
    Read,
    /// Whole-file write.
    Write,
}

impl EnumFsOperation {
    /// Short verb phrase used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDir => "create directory",
            Self::ReadDir => "read directory",
            Self::Inspect => "inspect",
            Self::CopyFile => "copy file",
            Self::Rename => "rename",
            Self::RemoveFile => "remove file",
            Self::RemoveDir => "remove directory",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for EnumFsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Options shared by the recursive tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTreeOptions {
    /// `remove_tree` rejects any path shorter than this many bytes.
    pub n_len_path_min: usize,
    /// Copy access/modify times and extended attributes along with file bytes.
    pub if_preserve_metadata: bool,
}

impl Default for SpecTreeOptions {
    fn default() -> Self {
        Self {
            n_len_path_min: N_LEN_REMOVE_PATH_MIN,
            if_preserve_metadata: false,
        }
    }
}

/// Options for `Workspace::put_contents_with`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecPutOptions {
    /// Create the missing parent chain instead of failing.
    pub if_create_dirs: bool,
    /// Mode for parent directories created when `if_create_dirs` is set.
    pub mode_dir_create: u32,
}

impl Default for SpecPutOptions {
    fn default() -> Self {
        Self {
            if_create_dirs: false,
            mode_dir_create: N_MODE_DIR_DEFAULT,
        }
    }
}

/// Options for `TempWorkspace::create_with`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTempWorkspaceOptions {
    /// Mode for the generated root directory.
    pub mode_dir: u32,
    /// Number of hex characters in the generated directory name (max 64).
    pub n_len_name: usize,
    /// Parent of the generated directory. `None` uses `std::env::temp_dir()`.
    ///
    /// Cleanup still applies `spec_tree_options.n_len_path_min`, so a short
    /// custom root needs a matching lower minimum.
    pub path_dir_temp_root: Option<PathBuf>,
    /// Options used by the workspace and by its cleanup.
    pub spec_tree_options: SpecTreeOptions,
}

impl Default for SpecTempWorkspaceOptions {
    fn default() -> Self {
        Self {
            mode_dir: N_MODE_DIR_DEFAULT,
            n_len_name: N_LEN_TEMP_DIR_NAME,
            path_dir_temp_root: None,
            spec_tree_options: SpecTreeOptions::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Errors returned by workspace and tree operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Destructive target is shorter than the configured minimum length.
    #[error(
        "Refusing to remove {}: path is shorter than {n_len_min} characters",
        .path.display()
    )]
    UnsafePath {
        /// Rejected path.
        path: PathBuf,
        /// Minimum length in effect.
        n_len_min: usize,
    },
    /// An underlying filesystem call failed.
    #[error("Failed to {operation} {}: {source}", .path.display())]
    FilesystemOperationFailed {
        /// Step that failed.
        operation: EnumFsOperation,
        /// Path the step was applied to.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A recursive copy aborted partway through.
    #[error(
        "Recursive copy {} -> {} failed, {}: {source}",
        .path_src.display(),
        .path_dst.display(),
        describe_rollback(.if_rolled_back)
    )]
    PartialCopyFailure {
        /// Source directory.
        path_src: PathBuf,
        /// Destination directory.
        path_dst: PathBuf,
        /// Whether the freshly created destination was removed again.
        if_rolled_back: bool,
        /// Underlying IO error of the failing entry.
        source: io::Error,
    },
    /// Recursive copy source is not a directory.
    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    /// Destination lies inside (or is) the source directory.
    #[error(
        "Destination is inside source directory: {} <-> {}",
        .path_src.display(),
        .path_dst.display()
    )]
    SourceDestinationOverlap {
        /// Source directory.
        path_src: PathBuf,
        /// Destination directory.
        path_dst: PathBuf,
    },
    /// Invalid option value.
    #[error("{0}")]
    InvalidOption(String),
}

fn describe_rollback(if_rolled_back: &bool) -> &'static str {
    if *if_rolled_back {
        "destination rolled back"
    } else {
        "destination left partially copied"
    }
}

impl WorkspaceError {
    /// Underlying IO error kind, when the failure came from the filesystem.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::FilesystemOperationFailed { source, .. }
            | Self::PartialCopyFailure { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

pub(crate) fn fs_error(
    operation: EnumFsOperation,
    path: impl Into<PathBuf>,
    source: io::Error,
) -> WorkspaceError {
    WorkspaceError::FilesystemOperationFailed {
        operation,
        path: path.into(),
        source,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;

    use super::{EnumFsOperation, WorkspaceError, fs_error};

    #[test]
    fn workspace_error_messages_name_path_and_step() {
        let err = fs_error(
            EnumFsOperation::RemoveDir,
            "/tmp/abcdefabcdef",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        let txt = err.to_string();
        assert!(txt.starts_with("Failed to remove directory /tmp/abcdefabcdef:"));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::PermissionDenied));

        let err = WorkspaceError::UnsafePath {
            path: PathBuf::from("/tmp"),
            n_len_min: 17,
        };
        assert_eq!(
            err.to_string(),
            "Refusing to remove /tmp: path is shorter than 17 characters"
        );
        assert_eq!(err.io_kind(), None);
    }

    #[test]
    fn partial_copy_failure_message_reports_rollback_state() {
        let err = WorkspaceError::PartialCopyFailure {
            path_src: PathBuf::from("/a"),
            path_dst: PathBuf::from("/b"),
            if_rolled_back: true,
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("destination rolled back"));
    }
}
