//! configure / patch / make against the extracted tree.
//!
//! Every step inherits this process's environment and standard streams so build
//! progress is visible as it happens. Steps are never retried.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Start `cmd` with inherited stdio and block until it exits.
pub fn run_inherited(mut cmd: Command) -> Result<()> {
    debug!(command = ?cmd, "executing command");
    let mut child = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| Error::process(format!("failed to start {:?}: {e}", cmd)))?;
    let status = child
        .wait()
        .map_err(|e| Error::process(format!("wait failed for {:?}: {e}", cmd)))?;
    if !status.success() {
        return Err(Error::process(format!("command {:?} failed: {status}", cmd)));
    }
    Ok(())
}

pub fn configure_command(build_dir: &Path, flags: &[String]) -> Command {
    let mut cmd = Command::new("./configure");
    cmd.args(flags).current_dir(build_dir);
    cmd
}

/// Forward-only, strict, silent: never prompts and fails instead of guessing.
pub fn patch_command(build_dir: &Path, patch_file: &Path) -> Command {
    let mut input = std::ffi::OsString::from("--input=");
    input.push(patch_file);
    let mut cmd = Command::new("patch");
    cmd.args(["-u", "-N", "-p0", "-f", "-s", "-d"])
        .arg(build_dir)
        .arg(input);
    cmd
}

pub fn compile_command(build_dir: &Path) -> Command {
    let mut cmd = Command::new("make");
    cmd.current_dir(build_dir);
    cmd
}

/// Relative patch paths are anchored at the invoking process's working directory,
/// never at the build directory.
pub fn resolve_patch_path(patch_file: &Path) -> Result<PathBuf> {
    if patch_file.is_absolute() {
        return Ok(patch_file.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::fs(format!("cwd error: {e}")))?;
    Ok(cwd.join(patch_file))
}

pub fn configure(build_dir: &Path, flags: &[String]) -> Result<()> {
    info!(dir = %build_dir.display(), "running ./configure");
    run_inherited(configure_command(build_dir, flags))
}

pub fn apply_patch(build_dir: &Path, patch_file: &Path) -> Result<()> {
    let patch = resolve_patch_path(patch_file)?;
    if !patch.is_file() {
        return Err(Error::fs(format!(
            "patch file {} does not exist",
            patch.display()
        )));
    }
    info!(patch = %patch.display(), dir = %build_dir.display(), "applying patch");
    run_inherited(patch_command(build_dir, &patch))
}

pub fn compile(build_dir: &Path) -> Result<()> {
    info!(dir = %build_dir.display(), "running make");
    run_inherited(compile_command(build_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn configure_runs_in_build_dir_with_flags() {
        let flags = vec!["--disable-debug".to_string(), "--with-x=y".to_string()];
        let cmd = configure_command(Path::new("/tmp/b"), &flags);
        assert_eq!(cmd.get_program(), "./configure");
        assert_eq!(args(&cmd), flags);
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/tmp/b")));
    }

    #[test]
    fn patch_targets_build_dir_without_changing_cwd() {
        let cmd = patch_command(Path::new("/tmp/b"), Path::new("/src/fix.patch"));
        assert_eq!(cmd.get_program(), "patch");
        assert_eq!(
            args(&cmd),
            vec!["-u", "-N", "-p0", "-f", "-s", "-d", "/tmp/b", "--input=/src/fix.patch"]
        );
        assert_eq!(cmd.get_current_dir(), None);
    }

    #[test]
    fn relative_patch_is_resolved_against_cwd() {
        let cwd = std::env::current_dir().expect("cwd");
        assert_eq!(
            resolve_patch_path(Path::new("scripts/x.patch")).expect("resolve"),
            cwd.join("scripts/x.patch")
        );
        assert_eq!(
            resolve_patch_path(Path::new("/abs/x.patch")).expect("resolve"),
            PathBuf::from("/abs/x.patch")
        );
    }

    #[test]
    fn missing_program_is_a_process_error() {
        let err = run_inherited(Command::new("/nonexistent/definitely-not-a-tool")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Process);
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_a_process_error() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 3");
        let err = run_inherited(cmd).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Process);
        assert!(err.to_string().contains('3'), "unexpected err: {err}");

        let mut ok = Command::new("sh");
        ok.arg("-c").arg("exit 0");
        run_inherited(ok).expect("exit 0");
    }

    #[test]
    fn missing_patch_file_fails_before_spawning() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = apply_patch(tmp.path(), &tmp.path().join("nope.patch")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Filesystem);
    }
}
