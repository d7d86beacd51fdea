use std::process::Command;

use crate::error::{Error, Result};

/// The launcher for `os` (as in `std::env::consts::OS`), if there is one.
pub fn browser_command(os: &str, url: &str) -> Option<Command> {
    let mut cmd = match os {
        "linux" | "freebsd" | "openbsd" | "netbsd" => Command::new("xdg-open"),
        "macos" => Command::new("open"),
        "windows" => {
            let mut c = Command::new("rundll32");
            c.arg("url.dll,FileProtocolHandler");
            c
        }
        _ => return None,
    };
    cmd.arg(url);
    Some(cmd)
}

/// Start the desktop's default browser on `url` without waiting for it.
pub fn open_default_browser(url: &str) -> Result<()> {
    let os = std::env::consts::OS;
    let mut cmd = browser_command(os, url)
        .ok_or_else(|| Error::environment(format!("unsupported platform {os}")))?;
    tracing::debug!(command = ?cmd, "opening browser");
    cmd.spawn()
        .map_err(|e| Error::process(format!("failed to open browser: {e}")))?;
    Ok(())
}
