//! Host tool checks that gate the pipeline before any network or disk work.

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolRequirement {
    pub name: String,
    #[serde(default)]
    pub hint: String,
}

impl ToolRequirement {
    pub fn new(name: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hint: hint.into(),
        }
    }
}

/// Check every requirement against the process `PATH`.
pub fn check_tools(tools: &[ToolRequirement]) -> Result<()> {
    check_tools_with(tools, |name| which::which(name.trim()).is_ok())
}

/// Evaluate the whole set before failing so the error names every missing tool.
pub fn check_tools_with<F>(tools: &[ToolRequirement], mut exists: F) -> Result<()>
where
    F: FnMut(&str) -> bool,
{
    let mut missing = Vec::new();
    for tool in tools {
        if exists(&tool.name) {
            tracing::debug!(tool = %tool.name, "found required tool");
            continue;
        }
        tracing::error!(tool = %tool.name, hint = %tool.hint, "required tool not found");
        missing.push(tool);
    }
    if missing.is_empty() {
        return Ok(());
    }

    let names = missing
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let hints = missing
        .iter()
        .filter(|t| !t.hint.trim().is_empty())
        .map(|t| format!("{}: {}", t.name, t.hint.trim()))
        .collect::<Vec<_>>();
    let mut msg = format!("one or more required commands not found: {names}");
    if !hints.is_empty() {
        msg.push_str(&format!(" ({})", hints.join("; ")));
    }
    Err(Error::environment(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn reqs() -> Vec<ToolRequirement> {
        vec![
            ToolRequirement::new("tar", "install tar"),
            ToolRequirement::new("patch", "install patch"),
            ToolRequirement::new("make", "install build-essential"),
        ]
    }

    #[test]
    fn reports_every_missing_tool() {
        let err = check_tools_with(&reqs(), |name| name == "tar").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Environment);
        let msg = err.to_string();
        assert!(msg.contains("patch"), "unexpected err: {msg}");
        assert!(msg.contains("make"), "unexpected err: {msg}");
        assert!(msg.contains("install build-essential"), "unexpected err: {msg}");
        assert!(!msg.contains("tar"), "unexpected err: {msg}");
    }

    #[test]
    fn checks_all_tools_even_after_a_miss() {
        let mut seen = Vec::new();
        let _ = check_tools_with(&reqs(), |name| {
            seen.push(name.to_string());
            false
        });
        assert_eq!(seen, vec!["tar", "patch", "make"]);
    }

    #[test]
    fn satisfied_set_passes() {
        check_tools_with(&reqs(), |_| true).expect("all present");
    }

    #[cfg(unix)]
    #[test]
    fn path_lookup_only_accepts_executable_files() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let bin_dir = tmp.path().join("bin");
        fs::create_dir_all(&bin_dir).expect("bin dir");
        let tool = bin_dir.join("fancytool");
        fs::write(&tool, "#!/bin/sh\n").expect("write tool");
        fs::write(bin_dir.join("plainfile"), "data").expect("write plain");
        fs::create_dir_all(bin_dir.join("somedir")).expect("dir");
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).expect("chmod");

        let path_var = std::env::join_paths([tmp.path().join("missing"), bin_dir.clone()])
            .expect("join paths");
        let found = |name: &str| which::which_in(name, Some(&path_var), tmp.path()).is_ok();

        let resolved =
            which::which_in("fancytool", Some(&path_var), tmp.path()).expect("fancytool");
        assert!(resolved.ends_with("bin/fancytool"), "resolved: {}", resolved.display());
        assert!(!found("plainfile"));
        assert!(!found("somedir"));

        let tools = vec![
            ToolRequirement::new("fancytool", ""),
            ToolRequirement::new("plainfile", "chmod +x it"),
        ];
        let err = check_tools_with(&tools, found).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Environment);
        assert!(err.to_string().contains("plainfile: chmod +x it"), "unexpected err: {err}");
        assert!(!err.to_string().contains("fancytool"), "unexpected err: {err}");
    }

    #[test]
    fn check_tools_reports_unknown_commands() {
        let err = check_tools(&[ToolRequirement::new(
            "openvpn-builder-no-such-tool",
            "install it",
        )])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Environment);
        assert!(err.to_string().contains("openvpn-builder-no-such-tool"));
    }
}
