use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::log_sanitize::{command_summary, sanitize_capture};

/// Target directory for an archive: `<dest_root>/<top_level_dir>`.
pub fn extract_target(dest_root: &Path, top_level_dir: &str) -> PathBuf {
    dest_root.join(top_level_dir)
}

/// Unpack `archive` under `<dest_root>/<top_level_dir>`, dropping the archive's own
/// top-level directory. Output is captured and logged whether or not tar succeeds.
/// Whatever was written before a failure is left for cleanup.
pub fn extract_archive(archive: &Path, dest_root: &Path, top_level_dir: &str) -> Result<PathBuf> {
    let target = extract_target(dest_root, top_level_dir);
    fs::create_dir_all(&target)
        .map_err(|e| Error::fs(format!("failed to create dir {}: {e}", target.display())))?;

    info!(archive = %archive.display(), dest = %target.display(), "unpacking archive");

    let mut cmd = Command::new("tar");
    cmd.arg("-xf")
        .arg(archive)
        .arg("-C")
        .arg(&target)
        .arg("--strip-components")
        .arg("1");

    let out = cmd
        .output()
        .map_err(|e| Error::process(format!("failed to run command {:?}: {e}", cmd)))?;

    let mut combined = out.stdout.clone();
    combined.extend_from_slice(&out.stderr);
    debug!(
        command = ?cmd,
        payload = %sanitize_capture(&combined),
        "unpacked tar file"
    );

    if !out.status.success() {
        return Err(Error::process(format!(
            "tar failed ({}): {}",
            out.status,
            command_summary(&out)
        )));
    }

    let summary = summarize_tree(&target);
    debug!(
        dest = %target.display(),
        files = summary.files,
        dirs = summary.dirs,
        "extracted tree"
    );
    if !summary.has_configure {
        warn!(dest = %target.display(), "extracted tree has no top-level configure script");
    }
    Ok(target)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub files: usize,
    pub dirs: usize,
    /// `configure` sits directly under the root, i.e. the wrapping directory was stripped.
    pub has_configure: bool,
}

pub fn summarize_tree(root: &Path) -> TreeSummary {
    let mut summary = TreeSummary::default();
    for entry in walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let ft = entry.file_type();
        if ft.is_dir() {
            summary.dirs += 1;
        } else {
            summary.files += 1;
            if entry.depth() == 1 && entry.file_name() == "configure" {
                summary.has_configure = true;
            }
        }
    }
    summary
}
