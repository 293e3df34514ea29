//! `scratchkit_io_fs` v1:
//! Root-confined scratch workspaces with recursive tree operations.
//!
//! Modules:
//! - `tree`      : recursive remove/copy with copy rollback
//! - `workspace` : relative-path operations over one root directory
//! - `temp`      : self-removing temp workspaces
//! - `spec`      : options/constants/errors
//! - `report`    : tree-operation counters
//! - `util`      : shared helper functions

pub mod report;
pub mod spec;
pub mod temp;
pub mod tree;
mod util;
pub mod workspace;

pub use report::{ReportTree, ReportTreeBuilder};
pub use spec::{
    EnumFsOperation, N_LEN_REMOVE_PATH_MIN, N_LEN_TEMP_DIR_NAME, N_MODE_DIR_DEFAULT,
    SpecPutOptions, SpecTempWorkspaceOptions, SpecTreeOptions, WorkspaceError,
};
pub use temp::TempWorkspace;
pub use tree::{copy_tree, remove_tree};
pub use workspace::Workspace;
