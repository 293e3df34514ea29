//! Root-confined file operations over one directory.

use std::fs;
use std::path::{MAIN_SEPARATOR_STR, Path, PathBuf};

use crate::report::{ReportTree, ReportTreeBuilder};
use crate::spec::{EnumFsOperation, SpecPutOptions, SpecTreeOptions, WorkspaceError, fs_error};
use crate::tree::{copy_tree, remove_tree};
use crate::util::{copy_file_with_metadata, create_dir_with_mode, is_same_file};

/// Handle scoping relative file operations to one root directory.
///
/// Every `sub` argument is resolved as `root + separator + sub`. Keeping `sub`
/// free of `..` components is the caller's job; it is not validated.
///
/// A `Workspace` never owns its root. See [`crate::TempWorkspace`] for the
/// owning variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    path_dir_root: PathBuf,
    spec_tree_options: SpecTreeOptions,
}

impl Workspace {
    /// Bind to `root` with default tree options. Does not touch the filesystem.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self::with_options(root, SpecTreeOptions::default())
    }

    /// Bind to `root` with explicit tree options.
    pub fn with_options<P: Into<PathBuf>>(root: P, spec_tree_options: SpecTreeOptions) -> Self {
        Self {
            path_dir_root: root.into(),
            spec_tree_options,
        }
    }

    /// Options used by recursive copy/delete.
    pub fn tree_options(&self) -> &SpecTreeOptions {
        &self.spec_tree_options
    }

    ////////////////////////////////////////////////////////////////////////////
    // #region PathQueries

    /// Workspace root.
    pub fn path(&self) -> &Path {
        &self.path_dir_root
    }

    /// Absolute path of `sub`; the root itself when `sub` is empty.
    pub fn path_of<P: AsRef<Path>>(&self, sub: P) -> PathBuf {
        let sub = sub.as_ref();
        if sub.as_os_str().is_empty() {
            return self.path_dir_root.clone();
        }
        let mut raw_path = self.path_dir_root.clone().into_os_string();
        raw_path.push(MAIN_SEPARATOR_STR);
        raw_path.push(sub.as_os_str());
        PathBuf::from(raw_path)
    }

    pub fn exists<P: AsRef<Path>>(&self, sub: P) -> bool {
        self.path_of(sub).exists()
    }

    pub fn is_file<P: AsRef<Path>>(&self, sub: P) -> bool {
        self.path_of(sub).is_file()
    }

    pub fn is_directory<P: AsRef<Path>>(&self, sub: P) -> bool {
        self.path_of(sub).is_dir()
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Mutations

    /// Create directory `sub` with `mode`.
    ///
    /// Fails when `sub` already exists, or when parents are missing and
    /// `if_recursive` is false.
    pub fn mkdir<P: AsRef<Path>>(
        &self,
        sub: P,
        mode: u32,
        if_recursive: bool,
    ) -> Result<(), WorkspaceError> {
        let path_dir = self.path_of(sub);
        create_dir_with_mode(&path_dir, mode, if_recursive)
            .map_err(|e| fs_error(EnumFsOperation::CreateDir, path_dir, e))
    }

    /// Copy a file or directory within this workspace.
    ///
    /// Directories go through [`copy_tree`] and merge into an existing
    /// destination. Not meant for crossing the workspace boundary; use
    /// [`Workspace::import`] / [`Workspace::export`] for that.
    pub fn copy<P, Q>(&self, sub_src: P, sub_dst: Q) -> Result<ReportTree, WorkspaceError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        self.copy_entry(&self.path_of(sub_src), &self.path_of(sub_dst))
    }

    /// Rename a file or directory within this workspace.
    pub fn move_entry<P, Q>(&self, sub_src: P, sub_dst: Q) -> Result<(), WorkspaceError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        rename_entry(&self.path_of(sub_src), &self.path_of(sub_dst))
    }

    /// Delete a file, symlink or directory tree.
    ///
    /// Returns `Ok(false)` when nothing exists at `sub`.
    pub fn delete<P: AsRef<Path>>(&self, sub: P) -> Result<bool, WorkspaceError> {
        let path_target = self.path_of(sub);
        let Ok(meta_target) = fs::symlink_metadata(&path_target) else {
            return Ok(false);
        };

        if meta_target.is_dir() {
            remove_tree(&path_target, &self.spec_tree_options)?;
        } else {
            fs::remove_file(&path_target)
                .map_err(|e| fs_error(EnumFsOperation::RemoveFile, path_target, e))?;
        }
        Ok(true)
    }

    /// Write `contents` to `sub`, failing if its parent directory is missing.
    pub fn put_contents<P, B>(&self, sub: P, contents: B) -> Result<usize, WorkspaceError>
    where
        P: AsRef<Path>,
        B: AsRef<[u8]>,
    {
        self.put_contents_with(sub, contents, &SpecPutOptions::default())
    }

    /// Write `contents` to `sub`, optionally creating the parent chain first.
    ///
    /// Returns the number of bytes written.
    pub fn put_contents_with<P, B>(
        &self,
        sub: P,
        contents: B,
        spec_put_options: &SpecPutOptions,
    ) -> Result<usize, WorkspaceError>
    where
        P: AsRef<Path>,
        B: AsRef<[u8]>,
    {
        let path_file = self.path_of(sub);
        if let Some(path_parent) = path_file.parent()
            && !path_parent.is_dir()
        {
            if !spec_put_options.if_create_dirs {
                return Err(fs_error(
                    EnumFsOperation::Write,
                    &path_file,
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("parent directory {} does not exist", path_parent.display()),
                    ),
                ));
            }
            create_dir_with_mode(path_parent, spec_put_options.mode_dir_create, true)
                .map_err(|e| fs_error(EnumFsOperation::CreateDir, path_parent, e))?;
        }

        let contents = contents.as_ref();
        fs::write(&path_file, contents)
            .map_err(|e| fs_error(EnumFsOperation::Write, path_file, e))?;
        Ok(contents.len())
    }

    /// Read the full content of `sub`.
    pub fn get_contents<P: AsRef<Path>>(&self, sub: P) -> Result<Vec<u8>, WorkspaceError> {
        let path_file = self.path_of(sub);
        fs::read(&path_file).map_err(|e| fs_error(EnumFsOperation::Read, path_file, e))
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Boundary

    /// Bring `external_src` into the workspace at `sub_dst`.
    ///
    /// With `if_copy` the source is duplicated (directory-aware); otherwise it
    /// is renamed in, which requires the same filesystem.
    pub fn import<P, Q>(
        &self,
        external_src: P,
        sub_dst: Q,
        if_copy: bool,
    ) -> Result<ReportTree, WorkspaceError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let path_dst = self.path_of(sub_dst);
        self.transfer(external_src.as_ref(), &path_dst, if_copy)
    }

    /// Send `sub_src` out of the workspace to `external_dst`.
    ///
    /// Same copy/rename rules as [`Workspace::import`].
    pub fn export<P, Q>(
        &self,
        sub_src: P,
        external_dst: Q,
        if_copy: bool,
    ) -> Result<ReportTree, WorkspaceError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let path_src = self.path_of(sub_src);
        self.transfer(&path_src, external_dst.as_ref(), if_copy)
    }

    fn transfer(
        &self,
        path_src: &Path,
        path_dst: &Path,
        if_copy: bool,
    ) -> Result<ReportTree, WorkspaceError> {
        if if_copy {
            return self.copy_entry(path_src, path_dst);
        }
        rename_entry(path_src, path_dst)?;
        Ok(ReportTree::default())
    }

    fn copy_entry(&self, path_src: &Path, path_dst: &Path) -> Result<ReportTree, WorkspaceError> {
        if path_src.is_dir() {
            return copy_tree(path_src, path_dst, None, &self.spec_tree_options);
        }

        if is_same_file(path_src, path_dst) {
            return Err(fs_error(
                EnumFsOperation::CopyFile,
                path_src,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("destination {} is the source file", path_dst.display()),
                ),
            ));
        }
        copy_file_with_metadata(path_src, path_dst, self.spec_tree_options.if_preserve_metadata)
            .map_err(|e| fs_error(EnumFsOperation::CopyFile, path_src, e))?;
        let mut builder_tree_report = ReportTreeBuilder::default();
        builder_tree_report.add_file_copied();
        Ok(builder_tree_report.build())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
}

fn rename_entry(path_src: &Path, path_dst: &Path) -> Result<(), WorkspaceError> {
    fs::rename(path_src, path_dst).map_err(|e| fs_error(EnumFsOperation::Rename, path_src, e))
}
