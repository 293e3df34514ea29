use std::collections::BTreeMap;
use std::path::PathBuf;

use pyo3::exceptions::{PyNotADirectoryError, PyOSError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;
use scratchkit_io_fs::{
    N_LEN_REMOVE_PATH_MIN, N_MODE_DIR_DEFAULT, ReportTree, SpecPutOptions,
    SpecTempWorkspaceOptions, SpecTreeOptions, TempWorkspace, Workspace, WorkspaceError,
    copy_tree, remove_tree,
};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "scratchkit.fs.workspace.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "ReportTree")]
#[derive(Debug, Clone)]
struct PyReportTree {
    #[pyo3(get)]
    cnt_dirs_created: u64,
    #[pyo3(get)]
    cnt_dirs_merged: u64,
    #[pyo3(get)]
    cnt_files_copied: u64,
    #[pyo3(get)]
    cnt_dirs_removed: u64,
    #[pyo3(get)]
    cnt_files_removed: u64,
}

impl From<ReportTree> for PyReportTree {
    fn from(report_tree: ReportTree) -> Self {
        Self {
            cnt_dirs_created: report_tree.cnt_dirs_created,
            cnt_dirs_merged: report_tree.cnt_dirs_merged,
            cnt_files_copied: report_tree.cnt_files_copied,
            cnt_dirs_removed: report_tree.cnt_dirs_removed,
            cnt_files_removed: report_tree.cnt_files_removed,
        }
    }
}

impl PyReportTree {
    fn to_report(&self) -> ReportTree {
        ReportTree {
            cnt_dirs_created: self.cnt_dirs_created,
            cnt_dirs_merged: self.cnt_dirs_merged,
            cnt_files_copied: self.cnt_files_copied,
            cnt_dirs_removed: self.cnt_dirs_removed,
            cnt_files_removed: self.cnt_files_removed,
        }
    }
}

#[pymethods]
impl PyReportTree {
    fn cnt_total(&self) -> u64 {
        self.to_report().cnt_total()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.to_report().to_dict()
    }

    #[pyo3(signature = (prefix = "[TREE]"))]
    fn format(&self, prefix: &str) -> String {
        self.to_report().format(prefix)
    }

    fn __str__(&self) -> String {
        self.format("[TREE]")
    }
}

fn map_workspace_error(exception: WorkspaceError) -> PyErr {
    match exception {
        WorkspaceError::SourceNotDirectory(_) => {
            PyNotADirectoryError::new_err(exception.to_string())
        }
        WorkspaceError::UnsafePath { .. }
        | WorkspaceError::SourceDestinationOverlap { .. }
        | WorkspaceError::InvalidOption(_) => PyValueError::new_err(exception.to_string()),
        WorkspaceError::FilesystemOperationFailed { .. }
        | WorkspaceError::PartialCopyFailure { .. } => PyOSError::new_err(exception.to_string()),
    }
}

#[derive(Debug)]
enum EnumWorkspaceHandle {
    /// Caller-owned root; closing only detaches.
    Plain(Workspace),
    /// Root removed on close or when Python finalizes the object.
    Temp(TempWorkspace),
}

#[pyclass(name = "Workspace")]
#[derive(Debug)]
struct PyWorkspace {
    handle: Option<EnumWorkspaceHandle>,
}

impl PyWorkspace {
    fn workspace(&self) -> PyResult<&Workspace> {
        match &self.handle {
            Some(EnumWorkspaceHandle::Plain(workspace)) => Ok(workspace),
            Some(EnumWorkspaceHandle::Temp(workspace)) => Ok(workspace.workspace()),
            None => Err(PyValueError::new_err("Workspace is closed.")),
        }
    }
}

#[pymethods]
impl PyWorkspace {
    #[new]
    #[pyo3(signature = (
        root,
        n_len_path_min = N_LEN_REMOVE_PATH_MIN,
        if_preserve_metadata = false
    ))]
    fn new(root: PathBuf, n_len_path_min: usize, if_preserve_metadata: bool) -> Self {
        let spec_tree_options = SpecTreeOptions {
            n_len_path_min,
            if_preserve_metadata,
        };
        Self {
            handle: Some(EnumWorkspaceHandle::Plain(Workspace::with_options(
                root,
                spec_tree_options,
            ))),
        }
    }

    #[getter]
    fn is_temporary(&self) -> bool {
        matches!(self.handle, Some(EnumWorkspaceHandle::Temp(_)))
    }

    #[getter]
    fn closed(&self) -> bool {
        self.handle.is_none()
    }

    #[pyo3(signature = (sub = None))]
    fn path(&self, sub: Option<&str>) -> PyResult<String> {
        let workspace = self.workspace()?;
        let path_resolved = workspace.path_of(sub.unwrap_or_default());
        Ok(path_resolved.to_string_lossy().to_string())
    }

    fn exists(&self, sub: &str) -> PyResult<bool> {
        Ok(self.workspace()?.exists(sub))
    }

    fn is_file(&self, sub: &str) -> PyResult<bool> {
        Ok(self.workspace()?.is_file(sub))
    }

    fn is_directory(&self, sub: &str) -> PyResult<bool> {
        Ok(self.workspace()?.is_directory(sub))
    }

    #[pyo3(signature = (sub, mode = N_MODE_DIR_DEFAULT, if_recursive = true))]
    fn mkdir(&self, sub: &str, mode: u32, if_recursive: bool) -> PyResult<()> {
        self.workspace()?
            .mkdir(sub, mode, if_recursive)
            .map_err(map_workspace_error)
    }

    fn copy(&self, py: Python<'_>, sub_src: &str, sub_dst: &str) -> PyResult<PyReportTree> {
        let workspace = self.workspace()?;
        let report_tree = py.allow_threads(|| workspace.copy(sub_src, sub_dst));
        report_tree
            .map(PyReportTree::from)
            .map_err(map_workspace_error)
    }

    #[pyo3(name = "move")]
    fn move_entry(&self, sub_src: &str, sub_dst: &str) -> PyResult<()> {
        self.workspace()?
            .move_entry(sub_src, sub_dst)
            .map_err(map_workspace_error)
    }

    fn delete(&self, py: Python<'_>, sub: &str) -> PyResult<bool> {
        let workspace = self.workspace()?;
        py.allow_threads(|| workspace.delete(sub))
            .map_err(map_workspace_error)
    }

    #[pyo3(signature = (
        sub,
        contents,
        if_create_dirs = false,
        mode_dir_create = N_MODE_DIR_DEFAULT
    ))]
    fn put_contents(
        &self,
        sub: &str,
        contents: &[u8],
        if_create_dirs: bool,
        mode_dir_create: u32,
    ) -> PyResult<usize> {
        let spec_put_options = SpecPutOptions {
            if_create_dirs,
            mode_dir_create,
        };
        self.workspace()?
            .put_contents_with(sub, contents, &spec_put_options)
            .map_err(map_workspace_error)
    }

    fn get_contents<'py>(&self, py: Python<'py>, sub: &str) -> PyResult<Bound<'py, PyBytes>> {
        let raw_bytes = self
            .workspace()?
            .get_contents(sub)
            .map_err(map_workspace_error)?;
        Ok(PyBytes::new(py, &raw_bytes))
    }

    #[pyo3(signature = (external_src, sub_dst, if_copy = true))]
    fn import_from(
        &self,
        py: Python<'_>,
        external_src: String,
        sub_dst: &str,
        if_copy: bool,
    ) -> PyResult<PyReportTree> {
        let workspace = self.workspace()?;
        py.allow_threads(|| workspace.import(&external_src, sub_dst, if_copy))
            .map(PyReportTree::from)
            .map_err(map_workspace_error)
    }

    #[pyo3(signature = (sub_src, external_dst, if_copy = true))]
    fn export_to(
        &self,
        py: Python<'_>,
        sub_src: &str,
        external_dst: String,
        if_copy: bool,
    ) -> PyResult<PyReportTree> {
        let workspace = self.workspace()?;
        py.allow_threads(|| workspace.export(sub_src, &external_dst, if_copy))
            .map(PyReportTree::from)
            .map_err(map_workspace_error)
    }

    /// Release the handle. Temporary workspaces remove their root here.
    fn close(&mut self, py: Python<'_>) -> PyResult<Option<PyReportTree>> {
        match self.handle.take() {
            Some(EnumWorkspaceHandle::Temp(workspace)) => py
                .allow_threads(|| workspace.close())
                .map(|report_tree| Some(PyReportTree::from(report_tree)))
                .map_err(map_workspace_error),
            Some(EnumWorkspaceHandle::Plain(_)) | None => Ok(None),
        }
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    fn __exit__(
        &mut self,
        py: Python<'_>,
        _exc_type: PyObject,
        _exc_value: PyObject,
        _traceback: PyObject,
    ) -> PyResult<bool> {
        self.close(py)?;
        Ok(false)
    }

    fn __repr__(&self) -> String {
        match &self.handle {
            Some(EnumWorkspaceHandle::Plain(workspace)) => {
                format!("Workspace(root={:?})", workspace.path())
            }
            Some(EnumWorkspaceHandle::Temp(workspace)) => {
                format!("Workspace(root={:?}, temporary=True)", workspace.path())
            }
            None => "Workspace(closed)".to_string(),
        }
    }
}

#[pyfunction(name = "create_temp_workspace")]
#[pyo3(signature = (
    mode_dir = N_MODE_DIR_DEFAULT,
    dir_temp_root = None,
    n_len_path_min = N_LEN_REMOVE_PATH_MIN,
    if_preserve_metadata = false
))]
fn create_temp_workspace_py(
    mode_dir: u32,
    dir_temp_root: Option<PathBuf>,
    n_len_path_min: usize,
    if_preserve_metadata: bool,
) -> PyResult<PyWorkspace> {
    let spec_temp_options = SpecTempWorkspaceOptions {
        mode_dir,
        path_dir_temp_root: dir_temp_root,
        spec_tree_options: SpecTreeOptions {
            n_len_path_min,
            if_preserve_metadata,
        },
        ..SpecTempWorkspaceOptions::default()
    };
    let workspace = TempWorkspace::create_with(spec_temp_options).map_err(map_workspace_error)?;
    Ok(PyWorkspace {
        handle: Some(EnumWorkspaceHandle::Temp(workspace)),
    })
}

#[pyfunction(name = "copy_tree")]
#[pyo3(signature = (
    dir_source,
    dir_destination,
    mode_dir_create = None,
    if_preserve_metadata = false
))]
fn copy_tree_py(
    py: Python<'_>,
    dir_source: String,
    dir_destination: String,
    mode_dir_create: Option<u32>,
    if_preserve_metadata: bool,
) -> PyResult<PyReportTree> {
    let spec_tree_options = SpecTreeOptions {
        if_preserve_metadata,
        ..SpecTreeOptions::default()
    };
    let report_tree = py.allow_threads(|| {
        copy_tree(dir_source, dir_destination, mode_dir_create, &spec_tree_options)
    });
    report_tree
        .map(PyReportTree::from)
        .map_err(map_workspace_error)
}

#[pyfunction(name = "remove_tree")]
#[pyo3(signature = (dir_target, n_len_path_min = N_LEN_REMOVE_PATH_MIN))]
fn remove_tree_py(
    py: Python<'_>,
    dir_target: String,
    n_len_path_min: usize,
) -> PyResult<PyReportTree> {
    let spec_tree_options = SpecTreeOptions {
        n_len_path_min,
        ..SpecTreeOptions::default()
    };
    let report_tree = py.allow_threads(|| remove_tree(dir_target, &spec_tree_options));
    report_tree
        .map(PyReportTree::from)
        .map_err(map_workspace_error)
}

#[pymodule]
fn _scratchkit_io_fs_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyReportTree>()?;
    module.add_class::<PyWorkspace>()?;
    module.add_function(wrap_pyfunction!(create_temp_workspace_py, module)?)?;
    module.add_function(wrap_pyfunction!(copy_tree_py, module)?)?;
    module.add_function(wrap_pyfunction!(remove_tree_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
