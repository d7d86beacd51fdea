use std::fs;
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};

/// Copy `src` to `dst` through a `buffer_size` buffer and mark the result executable.
/// Returns the number of bytes copied.
pub fn copy_file(src: &Path, dst: &Path, buffer_size: usize) -> Result<u64> {
    if buffer_size == 0 {
        return Err(Error::config("copy buffer size must be greater than zero"));
    }
    let meta = fs::metadata(src)
        .map_err(|e| Error::fs(format!("failed to stat {}: {e}", src.display())))?;
    if !meta.is_file() {
        return Err(Error::fs(format!("{} is not a regular file", src.display())));
    }

    let mut source = fs::File::open(src)
        .map_err(|e| Error::fs(format!("failed to open {}: {e}", src.display())))?;
    let mut destination = fs::File::create(dst)
        .map_err(|e| Error::fs(format!("failed to create {}: {e}", dst.display())))?;

    let mut buf = vec![0u8; buffer_size];
    let mut copied = 0u64;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(Error::fs(format!("failed to read {}: {e}", src.display())));
            }
        };
        destination
            .write_all(&buf[..n])
            .map_err(|e| Error::fs(format!("failed to write {}: {e}", dst.display())))?;
        copied += n as u64;
    }
    destination
        .flush()
        .map_err(|e| Error::fs(format!("failed to flush {}: {e}", dst.display())))?;
    drop(destination);

    make_executable(dst)?;
    Ok(copied)
}

/// Copy the built artifact out of the build tree.
pub fn install_artifact(build_dir: &Path, artifact: &Path, dest: &Path, buffer_size: usize) -> Result<()> {
    let src = build_dir.join(artifact);
    info!(src = %src.display(), dest = %dest.display(), "copying executable");
    let bytes = copy_file(&src, dest, buffer_size)?;
    info!(dest = %dest.display(), bytes, "installed executable");
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| Error::fs(format!("failed to chmod {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
