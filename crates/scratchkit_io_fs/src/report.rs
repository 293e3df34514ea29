//! Tree-operation report model and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Aggregate counters for one recursive copy/remove (or single-entry) operation.
///
/// Only totals are kept; a failing entry is reported through the error, not here.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportTree {
    /// Destination directories created.
    pub cnt_dirs_created: u64,
    /// Destination directories that already existed and were merged into.
    pub cnt_dirs_merged: u64,
    /// Files copied byte-for-byte.
    pub cnt_files_copied: u64,
    /// Directories removed.
    pub cnt_dirs_removed: u64,
    /// Files and symlinks unlinked.
    pub cnt_files_removed: u64,
}

impl ReportTree {
    /// Total number of entries touched.
    pub fn cnt_total(&self) -> u64 {
        self.cnt_dirs_created
            + self.cnt_dirs_merged
            + self.cnt_files_copied
            + self.cnt_dirs_removed
            + self.cnt_files_removed
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_dirs_created".to_string(), self.cnt_dirs_created);
        dict_counts.insert("cnt_dirs_merged".to_string(), self.cnt_dirs_merged);
        dict_counts.insert("cnt_files_copied".to_string(), self.cnt_files_copied);
        dict_counts.insert("cnt_dirs_removed".to_string(), self.cnt_dirs_removed);
        dict_counts.insert("cnt_files_removed".to_string(), self.cnt_files_removed);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} dirs_created={} dirs_merged={} files_copied={} dirs_removed={} files_removed={}",
            self.cnt_dirs_created,
            self.cnt_dirs_merged,
            self.cnt_files_copied,
            self.cnt_dirs_removed,
            self.cnt_files_removed
        )
    }
}

impl fmt::Display for ReportTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[TREE]"))
    }
}

/// Mutable accumulator for tree-operation counters.
#[derive(Debug, Default, Clone)]
pub struct ReportTreeBuilder {
    report: ReportTree,
}

impl ReportTreeBuilder {
    /// Increment created-directory count by one.
    pub fn add_dir_created(&mut self) {
        self.report.cnt_dirs_created += 1;
    }

    /// Increment merged-directory count by one.
    pub fn add_dir_merged(&mut self) {
        self.report.cnt_dirs_merged += 1;
    }

    /// Increment copied-file count by one.
    pub fn add_file_copied(&mut self) {
        self.report.cnt_files_copied += 1;
    }

    /// Increment removed-directory count by one.
    pub fn add_dir_removed(&mut self) {
        self.report.cnt_dirs_removed += 1;
    }

    /// Increment removed-file count by one.
    pub fn add_file_removed(&mut self) {
        self.report.cnt_files_removed += 1;
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportTree {
        self.report
    }
}
