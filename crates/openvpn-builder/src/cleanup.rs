use std::fmt;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// A removal that did not happen. Reported, never escalated into a build failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftFailure {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for SoftFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub warnings: Vec<SoftFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Remove the build tree and the downloaded archive. Each removal is attempted
/// regardless of how the other went; paths that are absent are skipped.
pub fn cleanup(build_dir: Option<&Path>, archive: Option<&Path>) -> CleanupReport {
    let mut report = CleanupReport::default();
    if let Some(dir) = build_dir {
        record(&mut report, dir, remove_dir_tree(dir), "failed removing build directory");
    }
    if let Some(file) = archive {
        record(&mut report, file, remove_file(file), "failed removing downloaded archive");
    }
    report
}

fn record(
    report: &mut CleanupReport,
    path: &Path,
    res: std::result::Result<bool, String>,
    what: &str,
) {
    match res {
        Ok(true) => {
            debug!(path = %path.display(), "removed");
            report.removed.push(path.to_path_buf());
        }
        Ok(false) => debug!(path = %path.display(), "nothing to remove"),
        Err(message) => {
            warn!(path = %path.display(), error = %message, "{what}");
            report.warnings.push(SoftFailure {
                path: path.to_path_buf(),
                message,
            });
        }
    }
}

fn remove_dir_tree(dir: &Path) -> std::result::Result<bool, String> {
    if dir.parent().is_none() {
        return Err(format!("refusing to remove '{}'", dir.display()));
    }
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
        Err(e) => Err(format!("failed to remove dir {}: {e}", dir.display())),
    }
}

fn remove_file(file: &Path) -> std::result::Result<bool, String> {
    match fs::remove_file(file) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
        Err(e) => Err(format!("failed to remove file {}: {e}", file.display())),
    }
}
