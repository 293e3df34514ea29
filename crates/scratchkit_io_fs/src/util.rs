use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::spec::WorkspaceError;

////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

pub(crate) fn absolutize_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

/// Drop `.` and fold `..` into its parent without touching the filesystem.
fn _clean_path_lexically(path: &Path) -> PathBuf {
    let mut path_clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !path_clean.pop() {
                    path_clean.push(component);
                }
            }
            _ => path_clean.push(component),
        }
    }
    path_clean
}

/// Resolve symlinks of the deepest existing ancestor and re-append the rest.
fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    let path_abs = _clean_path_lexically(&absolutize_path(path));
    let mut l_tail = Vec::new();
    let mut path_cursor = path_abs.as_path();
    loop {
        if let Ok(mut resolved) = fs::canonicalize(path_cursor) {
            for part in l_tail.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        let (Some(path_parent), Some(name)) = (path_cursor.parent(), path_cursor.file_name())
        else {
            return path_abs;
        };
        l_tail.push(name.to_os_string());
        path_cursor = path_parent;
    }
}

/// `true` when `path_inner` equals `path_outer` or lies below it.
pub(crate) fn is_nested(path_outer: &Path, path_inner: &Path) -> bool {
    let path_outer_resolved = _normalize_path(path_outer);
    let path_inner_resolved = _normalize_path(path_inner);
    if path_inner_resolved
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return false;
    }
    path_inner_resolved.starts_with(&path_outer_resolved)
}

/// `true` when both paths name the same existing filesystem object.
pub(crate) fn is_same_file(path_a: &Path, path_b: &Path) -> bool {
    let (Ok(meta_a), Ok(meta_b)) = (fs::metadata(path_a), fs::metadata(path_b)) else {
        return false;
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        meta_a.dev() == meta_b.dev() && meta_a.ino() == meta_b.ino()
    }
    #[cfg(not(unix))]
    {
        let _ = (meta_a, meta_b);
        matches!(
            (fs::canonicalize(path_a), fs::canonicalize(path_b)),
            (Ok(a), Ok(b)) if a == b
        )
    }
}

pub(crate) fn validate_removal_path(path: &Path, n_len_min: usize) -> Result<(), WorkspaceError> {
    if path.as_os_str().len() < n_len_min {
        return Err(WorkspaceError::UnsafePath {
            path: path.to_path_buf(),
            n_len_min,
        });
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DirectoryAndFileIo

/// Permission bits of `meta`, as passed to directory creation.
pub(crate) fn derive_mode(meta: &fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o7777
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        crate::spec::N_MODE_DIR_DEFAULT
    }
}

/// Create `path` with `mode`.
///
/// Unlike `DirBuilder` in recursive mode, an existing entry at `path` is an
/// `AlreadyExists` error in both modes.
pub(crate) fn create_dir_with_mode(path: &Path, mode: u32, if_recursive: bool) -> io::Result<()> {
    if if_recursive && fs::symlink_metadata(path).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        ));
    }

    let mut builder_dir = fs::DirBuilder::new();
    builder_dir.recursive(if_recursive);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder_dir.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder_dir.create(path)
}

/// Copy file bytes and permission bits; optionally times and xattrs as well.
pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
    if_preserve_metadata: bool,
) -> io::Result<u64> {
    let n_bytes = fs::copy(path_file_src, path_file_dst)?;
    if if_preserve_metadata {
        apply_metadata(path_file_src, path_file_dst)?;
    }
    Ok(n_bytes)
}

fn apply_metadata(path_file_src: &Path, path_file_dst: &Path) -> io::Result<()> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_file_src)?;
    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    #[cfg(target_os = "linux")]
    copy_xattrs_linux(path_file_src, path_file_dst);
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_file_src) {
        Ok(v) => v,
        Err(_) => return,
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        let _ = xattr::set(path_file_dst, &name, &raw_value);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TempNames

static N_SEQ_TEMP_NAME: AtomicU64 = AtomicU64::new(0);

/// Hex token hashed from the current time, pid and an in-process sequence.
///
/// Not collision-proof; callers treat an existing directory as failure.
pub(crate) fn derive_temp_dir_name(n_len_name: usize) -> String {
    let n_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let n_seq = N_SEQ_TEMP_NAME.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(n_nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(n_seq.to_le_bytes());
    let c_digest = hex::encode(hasher.finalize());
    c_digest.chars().take(n_len_name).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
