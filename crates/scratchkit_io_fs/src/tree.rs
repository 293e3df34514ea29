//! Recursive directory-tree remove and copy.

use std::fs;
use std::io;
use std::path::Path;

use crate::report::{ReportTree, ReportTreeBuilder};
use crate::spec::{EnumFsOperation, SpecTreeOptions, WorkspaceError, fs_error};
use crate::util::{
    absolutize_path, copy_file_with_metadata, create_dir_with_mode, derive_mode, is_nested,
    validate_removal_path,
};

#[derive(Debug)]
struct SpecCopyContext<'a> {
    spec_tree_options: &'a SpecTreeOptions,
    builder_tree_report: ReportTreeBuilder,
}

////////////////////////////////////////////////////////////////////////////////
// #region Remove

/// Remove `dir_target` and everything below it.
///
/// The path length is checked against [`SpecTreeOptions::n_len_path_min`]
/// before anything else, so a too-short path fails with
/// [`WorkspaceError::UnsafePath`] whether or not it exists.
///
/// Entries are removed child-first; symlinks are unlinked, never followed.
/// This includes `dir_target` itself: a symlinked root is unlinked and its
/// target is left alone. The walk stops at the first failure.
pub fn remove_tree<P: AsRef<Path>>(
    dir_target: P,
    spec_tree_options: &SpecTreeOptions,
) -> Result<ReportTree, WorkspaceError> {
    let path_dir = dir_target.as_ref();
    validate_removal_path(path_dir, spec_tree_options.n_len_path_min)?;

    let mut builder_tree_report = ReportTreeBuilder::default();
    let meta_root = fs::symlink_metadata(path_dir)
        .map_err(|e| fs_error(EnumFsOperation::Inspect, path_dir, e))?;
    if meta_root.file_type().is_symlink() {
        fs::remove_file(path_dir)
            .map_err(|e| fs_error(EnumFsOperation::RemoveFile, path_dir, e))?;
        builder_tree_report.add_file_removed();
        tracing::debug!(path = %path_dir.display(), "unlinked symlinked tree root");
        return Ok(builder_tree_report.build());
    }

    remove_children(path_dir, &mut builder_tree_report)?;
    fs::remove_dir(path_dir).map_err(|e| fs_error(EnumFsOperation::RemoveDir, path_dir, e))?;
    builder_tree_report.add_dir_removed();

    let report_tree = builder_tree_report.build();
    tracing::debug!(
        path = %path_dir.display(),
        cnt_dirs_removed = report_tree.cnt_dirs_removed,
        cnt_files_removed = report_tree.cnt_files_removed,
        "removed directory tree"
    );
    Ok(report_tree)
}

fn remove_children(
    path_dir: &Path,
    builder_tree_report: &mut ReportTreeBuilder,
) -> Result<(), WorkspaceError> {
    let iter_entries =
        fs::read_dir(path_dir).map_err(|e| fs_error(EnumFsOperation::ReadDir, path_dir, e))?;

    for _entry_res in iter_entries {
        let entry = _entry_res.map_err(|e| fs_error(EnumFsOperation::ReadDir, path_dir, e))?;
        let path_entry = entry.path();
        let cfg_file_type = entry
            .file_type()
            .map_err(|e| fs_error(EnumFsOperation::Inspect, &path_entry, e))?;

        if cfg_file_type.is_dir() {
            remove_children(&path_entry, builder_tree_report)?;
            fs::remove_dir(&path_entry)
                .map_err(|e| fs_error(EnumFsOperation::RemoveDir, &path_entry, e))?;
            builder_tree_report.add_dir_removed();
        } else {
            fs::remove_file(&path_entry)
                .map_err(|e| fs_error(EnumFsOperation::RemoveFile, &path_entry, e))?;
            builder_tree_report.add_file_removed();
        }
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Copy

/// Copy the contents of `dir_source` into `dir_destination`.
///
/// `dir_source` itself is not nested: `src/a.txt` lands at `dst/a.txt`.
///
/// When `dir_destination` does not exist it is created (with parents) using
/// `mode_dir_create`, or the permission bits of `dir_source` when `None`.
/// Subdirectories are created with their source permission bits; existing
/// destination subdirectories are merged into.
///
/// On the first failing entry the walk aborts. A destination created by this
/// call is then removed again (best effort) and the error reports
/// `if_rolled_back`. A destination that already existed is left as-is,
/// partial copy included.
///
/// A fresh destination must pass the removal length guard on its absolute
/// path before it is created, so that a rollback is always possible.
pub fn copy_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    mode_dir_create: Option<u32>,
    spec_tree_options: &SpecTreeOptions,
) -> Result<ReportTree, WorkspaceError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref().to_path_buf();
    let path_dir_dst = dir_destination.as_ref().to_path_buf();

    let meta_dir_src = fs::metadata(&path_dir_src)
        .map_err(|e| fs_error(EnumFsOperation::Inspect, &path_dir_src, e))?;
    if !meta_dir_src.is_dir() {
        return Err(WorkspaceError::SourceNotDirectory(path_dir_src));
    }
    if is_nested(&path_dir_src, &path_dir_dst) {
        return Err(WorkspaceError::SourceDestinationOverlap {
            path_src: path_dir_src,
            path_dst: path_dir_dst,
        });
    }

    let mut spec_cp_ctx = SpecCopyContext {
        spec_tree_options,
        builder_tree_report: ReportTreeBuilder::default(),
    };

    let b_dst_existed = path_dir_dst.is_dir();
    let path_dir_dst_abs = absolutize_path(&path_dir_dst);
    if !b_dst_existed {
        validate_removal_path(&path_dir_dst_abs, spec_tree_options.n_len_path_min)?;
        let mode_dir = mode_dir_create.unwrap_or_else(|| derive_mode(&meta_dir_src));
        create_dir_with_mode(&path_dir_dst, mode_dir, true)
            .map_err(|e| fs_error(EnumFsOperation::CreateDir, &path_dir_dst, e))?;
        spec_cp_ctx.builder_tree_report.add_dir_created();
    }

    if let Err(e) = copy_children(&path_dir_src, &path_dir_dst, &mut spec_cp_ctx) {
        let if_rolled_back =
            !b_dst_existed && rollback_destination(&path_dir_dst_abs, spec_tree_options);
        return Err(WorkspaceError::PartialCopyFailure {
            path_src: path_dir_src,
            path_dst: path_dir_dst,
            if_rolled_back,
            source: e,
        });
    }

    let report_tree = spec_cp_ctx.builder_tree_report.build();
    tracing::debug!(
        path_src = %path_dir_src.display(),
        path_dst = %path_dir_dst.display(),
        cnt_dirs_created = report_tree.cnt_dirs_created,
        cnt_dirs_merged = report_tree.cnt_dirs_merged,
        cnt_files_copied = report_tree.cnt_files_copied,
        "copied directory tree"
    );
    Ok(report_tree)
}

fn rollback_destination(path_dir_dst: &Path, spec_tree_options: &SpecTreeOptions) -> bool {
    match remove_tree(path_dir_dst, spec_tree_options) {
        Ok(_) => {
            tracing::debug!(path = %path_dir_dst.display(), "rolled back partial copy");
            true
        }
        Err(e) => {
            tracing::warn!(
                path = %path_dir_dst.display(),
                error = %e,
                "failed to roll back partial copy"
            );
            false
        }
    }
}

fn copy_children(
    path_dir_src: &Path,
    path_dir_dst: &Path,
    spec_cp_ctx: &mut SpecCopyContext<'_>,
) -> io::Result<()> {
    let mut l_entries = fs::read_dir(path_dir_src)?.collect::<io::Result<Vec<_>>>()?;
    l_entries.sort_by_key(|entry| entry.file_name());

    for entry in l_entries {
        let path_src = entry.path();
        let path_dst = path_dir_dst.join(entry.file_name());
        let cfg_file_type = entry.file_type()?;

        let b_is_symlink = cfg_file_type.is_symlink();
        let b_is_dir = cfg_file_type.is_dir() || (b_is_symlink && path_src.is_dir());
        if !b_is_dir {
            copy_file_with_metadata(
                &path_src,
                &path_dst,
                spec_cp_ctx.spec_tree_options.if_preserve_metadata,
            )?;
            spec_cp_ctx.builder_tree_report.add_file_copied();
            continue;
        }

        if path_dst.is_dir() {
            spec_cp_ctx.builder_tree_report.add_dir_merged();
        } else {
            let meta_src = fs::metadata(&path_src)?;
            create_dir_with_mode(&path_dst, derive_mode(&meta_src), true)?;
            spec_cp_ctx.builder_tree_report.add_dir_created();
        }

        if !b_is_symlink {
            copy_children(&path_src, &path_dst, spec_cp_ctx)?;
        }
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{copy_tree, remove_tree};
    use crate::spec::{SpecTreeOptions, WorkspaceError};

    fn write_text(path: &Path, txt: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, txt).expect("write text");
    }

    fn read_text(path: &Path) -> String {
        std::fs::read_to_string(path).expect("read text")
    }

    #[test]
    fn remove_tree_removes_nested_entries_and_root() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("victim");
        write_text(&root.join("a.txt"), "a");
        write_text(&root.join("sub/b.txt"), "b");
        write_text(&root.join("sub/deeper/c.txt"), "c");
        std::fs::create_dir_all(root.join("empty")).expect("mkdir empty");

        let report = remove_tree(&root, &SpecTreeOptions::default()).expect("remove tree");
        assert!(!root.exists());
        assert_eq!(report.cnt_files_removed, 3);
        assert_eq!(report.cnt_dirs_removed, 4);
        assert!(tmp.path().exists());
    }

    #[test]
    fn remove_tree_rejects_short_paths_before_touching_disk() {
        let spec_tree_options = SpecTreeOptions::default();
        for c_path in ["/", "/tmp", "/tmp/", "relative", "/definitely/nope"] {
            let err = remove_tree(c_path, &spec_tree_options).expect_err("must fail");
            assert!(
                matches!(err, WorkspaceError::UnsafePath { n_len_min: 17, .. }),
                "unexpected error for {c_path}: {err}"
            );
        }
    }

    #[test]
    fn remove_tree_honours_configured_minimum() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("x");
        std::fs::create_dir_all(&root).expect("mkdir");

        let spec_tree_options = SpecTreeOptions {
            n_len_path_min: root.as_os_str().len() + 1,
            ..SpecTreeOptions::default()
        };
        let err = remove_tree(&root, &spec_tree_options).expect_err("must fail");
        assert!(matches!(err, WorkspaceError::UnsafePath { .. }));
        assert!(root.exists());
    }

    #[test]
    fn remove_tree_missing_path_is_filesystem_failure() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = remove_tree(tmp.path().join("missing"), &SpecTreeOptions::default())
            .expect_err("must fail");
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
    }

    #[cfg(unix)]
    #[test]
    fn remove_tree_unlinks_symlinks_without_following() {
        use std::os::unix::fs::symlink;

        let tmp = tempfile::tempdir().expect("tempdir");
        let outside = tmp.path().join("outside");
        let root = tmp.path().join("victim");
        write_text(&outside.join("keep.txt"), "keep");
        std::fs::create_dir_all(&root).expect("mkdir");
        symlink(&outside, root.join("link_dir")).expect("symlink");

        remove_tree(&root, &SpecTreeOptions::default()).expect("remove tree");
        assert!(!root.exists());
        assert_eq!(read_text(&outside.join("keep.txt")), "keep");
    }

    #[cfg(unix)]
    #[test]
    fn remove_tree_unlinks_symlinked_root_and_keeps_target() {
        use std::os::unix::fs::symlink;

        let tmp = tempfile::tempdir().expect("tempdir");
        let precious = tmp.path().join("precious");
        let link_root = tmp.path().join("link_to_precious");
        write_text(&precious.join("keep.txt"), "keep");
        symlink(&precious, &link_root).expect("symlink");

        let report = remove_tree(&link_root, &SpecTreeOptions::default()).expect("remove link");
        assert_eq!(report.cnt_files_removed, 1);
        assert_eq!(report.cnt_dirs_removed, 0);
        assert!(std::fs::symlink_metadata(&link_root).is_err());
        assert_eq!(read_text(&precious.join("keep.txt")), "keep");
    }

    #[test]
    fn copy_tree_copies_contents_into_fresh_destination() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("out/dst");

        write_text(&src.join("root.txt"), "root");
        write_text(&src.join("a/file1.txt"), "a");
        write_text(&src.join("b/sub/file2.txt"), "b");

        let report = copy_tree(&src, &dst, None, &SpecTreeOptions::default()).expect("copy tree");
        assert_eq!(read_text(&dst.join("root.txt")), "root");
        assert_eq!(read_text(&dst.join("a/file1.txt")), "a");
        assert_eq!(read_text(&dst.join("b/sub/file2.txt")), "b");
        assert_eq!(report.cnt_files_copied, 3);
        // dst, a, b, b/sub
        assert_eq!(report.cnt_dirs_created, 4);
        assert_eq!(report.cnt_dirs_merged, 0);
    }

    #[test]
    fn copy_tree_merges_into_existing_subdirectories() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");

        write_text(&src.join("shared/new.txt"), "new");
        write_text(&dst.join("shared/existing.txt"), "old");

        let report = copy_tree(&src, &dst, None, &SpecTreeOptions::default()).expect("copy tree");
        assert_eq!(read_text(&dst.join("shared/new.txt")), "new");
        assert_eq!(read_text(&dst.join("shared/existing.txt")), "old");
        assert_eq!(report.cnt_dirs_merged, 1);
        assert_eq!(report.cnt_dirs_created, 0);

        copy_tree(&src, &dst, None, &SpecTreeOptions::default()).expect("second copy");
        assert_eq!(read_text(&dst.join("shared/new.txt")), "new");
    }

    #[test]
    fn copy_tree_result_is_independent_of_source() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_text(&src.join("x/y.bin"), "payload");

        copy_tree(&src, &dst, None, &SpecTreeOptions::default()).expect("copy tree");
        remove_tree(&src, &SpecTreeOptions::default()).expect("remove source");

        assert!(!src.exists());
        assert_eq!(read_text(&dst.join("x/y.bin")), "payload");
    }

    #[test]
    fn copy_tree_rejects_non_directory_source_and_nested_destination() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        write_text(&src.join("file.txt"), "x");

        let err = copy_tree(
            src.join("file.txt"),
            tmp.path().join("dst"),
            None,
            &SpecTreeOptions::default(),
        )
        .expect_err("file source");
        assert!(matches!(err, WorkspaceError::SourceNotDirectory(_)));

        let err = copy_tree(&src, src.join("nested"), None, &SpecTreeOptions::default())
            .expect_err("nested destination");
        assert!(matches!(err, WorkspaceError::SourceDestinationOverlap { .. }));
        assert!(!src.join("nested").exists());
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_failure_rolls_back_fresh_destination() {
        use std::os::unix::fs::symlink;

        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_text(&src.join("a.txt"), "a");
        write_text(&src.join("sub/b.txt"), "b");
        symlink(tmp.path().join("nowhere"), src.join("sub/z_dangling")).expect("symlink");

        let err = copy_tree(&src, &dst, None, &SpecTreeOptions::default()).expect_err("must fail");
        assert!(matches!(
            err,
            WorkspaceError::PartialCopyFailure {
                if_rolled_back: true,
                ..
            }
        ));
        assert!(!dst.exists());
    }

    #[test]
    fn copy_tree_rejects_fresh_destination_that_could_not_be_rolled_back() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("out");
        write_text(&src.join("a.txt"), "a");

        let spec_tree_options = SpecTreeOptions {
            n_len_path_min: dst.as_os_str().len() + 1,
            ..SpecTreeOptions::default()
        };
        let err = copy_tree(&src, &dst, None, &spec_tree_options).expect_err("must fail");
        assert!(matches!(err, WorkspaceError::UnsafePath { .. }));
        assert!(!dst.exists());

        std::fs::create_dir_all(&dst).expect("mkdir dst");
        copy_tree(&src, &dst, None, &spec_tree_options).expect("existing destination");
        assert_eq!(read_text(&dst.join("a.txt")), "a");
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_failure_keeps_partial_copy_in_existing_destination() {
        use std::os::unix::fs::symlink;

        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_text(&src.join("a.txt"), "a");
        symlink(tmp.path().join("nowhere"), src.join("z_dangling")).expect("symlink");
        write_text(&dst.join("keep.txt"), "keep");

        let err = copy_tree(&src, &dst, None, &SpecTreeOptions::default()).expect_err("must fail");
        assert!(matches!(
            err,
            WorkspaceError::PartialCopyFailure {
                if_rolled_back: false,
                ..
            }
        ));
        assert_eq!(read_text(&dst.join("keep.txt")), "keep");
        assert_eq!(read_text(&dst.join("a.txt")), "a");
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_applies_create_mode_and_source_modes() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_text(&src.join("sub/f.txt"), "f");
        std::fs::set_permissions(src.join("sub"), std::fs::Permissions::from_mode(0o700))
            .expect("chmod sub");

        copy_tree(&src, &dst, Some(0o700), &SpecTreeOptions::default()).expect("copy tree");

        let n_mode_root = std::fs::metadata(&dst).expect("dst meta").permissions().mode();
        let n_mode_sub = std::fs::metadata(dst.join("sub"))
            .expect("sub meta")
            .permissions()
            .mode();
        assert_eq!(n_mode_root & 0o777, 0o700);
        assert_eq!(n_mode_sub & 0o777, 0o700);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn copy_tree_preserves_times_when_requested() {
        use filetime::{FileTime, set_file_times};

        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        let path_file_src = src.join("meta.txt");
        write_text(&path_file_src, "meta");
        set_file_times(
            &path_file_src,
            FileTime::from_unix_time(1_700_000_010, 0),
            FileTime::from_unix_time(1_700_000_020, 0),
        )
        .expect("set times");

        let spec_tree_options = SpecTreeOptions {
            if_preserve_metadata: true,
            ..SpecTreeOptions::default()
        };
        copy_tree(&src, &dst, None, &spec_tree_options).expect("copy tree");

        let stat_dst = std::fs::metadata(dst.join("meta.txt")).expect("dst metadata");
        assert_eq!(
            FileTime::from_last_modification_time(&stat_dst),
            FileTime::from_unix_time(1_700_000_020, 0)
        );
    }
}
