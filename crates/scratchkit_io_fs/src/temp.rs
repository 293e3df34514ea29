//! Self-removing scratch workspaces under the system temp directory.

use std::ops::Deref;

use crate::report::ReportTree;
use crate::spec::{EnumFsOperation, SpecTempWorkspaceOptions, WorkspaceError, fs_error};
use crate::tree::remove_tree;
use crate::util::{create_dir_with_mode, derive_temp_dir_name};
use crate::workspace::Workspace;

/// Owning [`Workspace`] whose root is removed when the handle goes away.
///
/// Release happens either through [`TempWorkspace::close`], which reports
/// cleanup errors, or through `Drop`, which only logs them. All workspace
/// operations are reachable through `Deref`.
///
/// ```no_run
/// use scratchkit_io_fs::TempWorkspace;
///
/// let workspace = TempWorkspace::create(0o777)?;
/// workspace.put_contents("hello.txt", "hello")?;
/// let report = workspace.close()?;
/// assert_eq!(report.cnt_files_removed, 1);
/// # Ok::<(), scratchkit_io_fs::WorkspaceError>(())
/// ```
#[derive(Debug)]
pub struct TempWorkspace {
    workspace: Workspace,
    if_released: bool,
}

impl TempWorkspace {
    /// Create a fresh directory under `std::env::temp_dir()` with `mode_dir`.
    pub fn create(mode_dir: u32) -> Result<Self, WorkspaceError> {
        Self::create_with(SpecTempWorkspaceOptions {
            mode_dir,
            ..SpecTempWorkspaceOptions::default()
        })
    }

    /// Create a fresh directory as described by `spec_temp_options`.
    ///
    /// The generated name is not guaranteed unique: if the directory already
    /// exists the call fails, with no retry.
    pub fn create_with(
        spec_temp_options: SpecTempWorkspaceOptions,
    ) -> Result<Self, WorkspaceError> {
        if spec_temp_options.n_len_name == 0 {
            return Err(WorkspaceError::InvalidOption(
                "Arg `n_len_name` must be >= 1.".to_string(),
            ));
        }

        let path_dir_temp_root = spec_temp_options
            .path_dir_temp_root
            .unwrap_or_else(std::env::temp_dir);
        let path_dir = path_dir_temp_root.join(derive_temp_dir_name(spec_temp_options.n_len_name));
        create_dir_with_mode(&path_dir, spec_temp_options.mode_dir, true)
            .map_err(|e| fs_error(EnumFsOperation::CreateDir, &path_dir, e))?;

        tracing::debug!(path = %path_dir.display(), "created temp workspace");
        Ok(Self {
            workspace: Workspace::with_options(path_dir, spec_temp_options.spec_tree_options),
            if_released: false,
        })
    }

    /// Borrowed view of the underlying workspace.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Remove the root directory now and report the outcome.
    ///
    /// Cleanup is attempted once; `Drop` does not retry after a failure here.
    pub fn close(mut self) -> Result<ReportTree, WorkspaceError> {
        self.if_released = true;
        remove_tree(self.workspace.path(), self.workspace.tree_options())
    }
}

impl Deref for TempWorkspace {
    type Target = Workspace;

    fn deref(&self) -> &Self::Target {
        &self.workspace
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if self.if_released {
            return;
        }
        match remove_tree(self.workspace.path(), self.workspace.tree_options()) {
            Ok(_) => {
                tracing::debug!(
                    path = %self.workspace.path().display(),
                    "removed temp workspace"
                );
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.workspace.path().display(),
                    error = %e,
                    "failed to remove temp workspace"
                );
            }
        }
    }
}
