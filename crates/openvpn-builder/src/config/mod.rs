use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use toml::Value;

use crate::error::{Error, Result};

mod build;

pub use build::{
    BuildConfig, BuildSection, InstallSection, Overrides, PreflightSection, SourceSection,
    DEFAULT_ARCHIVE_PATTERN, DEFAULT_BUILD_ROOT, DEFAULT_COPY_BUFFER_SIZE, DEFAULT_MIRROR_URL,
    DEFAULT_PATCH_FILE, DEFAULT_SOURCE_URL, DEFAULT_TOP_LEVEL_DIR, SUPPORT_URL,
};

pub const DEFAULT_CONFIG_FILENAME: &str = "openvpn-builder.toml";
pub const DEFAULT_CONFIG_DIRECTORY_NAME: &str = "openvpn-builder";

#[derive(Debug, Clone)]
pub struct ConfigDoc {
    pub path: PathBuf,
    pub value: Value,
}

impl ConfigDoc {
    /// A document with no tables; every section falls back to its defaults.
    pub fn empty() -> Self {
        Self {
            path: PathBuf::from("<defaults>"),
            value: Value::Table(Default::default()),
        }
    }

    pub fn value_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return Some(&self.value);
        }

        let mut cur = &self.value;
        for seg in path.split('.') {
            let tbl = cur.as_table()?;
            cur = tbl.get(seg)?;
        }
        Some(cur)
    }

    pub fn deserialize_path<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let Some(v) = self.value_path(path) else {
            return Ok(None);
        };
        let parsed = v.clone().try_into().map_err(|e| {
            Error::config(format!(
                "failed to deserialize config at '{}' in {}: {e}",
                path,
                self.path.display()
            ))
        })?;
        Ok(Some(parsed))
    }
}

pub fn load(path: &Path) -> Result<ConfigDoc> {
    let data = fs::read_to_string(path).map_err(|e| {
        Error::config(format!("failed to read config {}: {e}", path.display()))
    })?;
    let value: Value = toml::from_str(&data).map_err(|e| {
        Error::config(format!("TOML parse error in {}: {e}", path.display()))
    })?;
    if !value.is_table() {
        return Err(Error::config(format!(
            "config {} must be a TOML table",
            path.display()
        )));
    }
    Ok(ConfigDoc {
        path: path.to_path_buf(),
        value,
    })
}

/// Per-user config directory: `~/.config/openvpn-builder` (`AppData\Local` on Windows).
pub fn home_config_dir() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let config_folder = if cfg!(windows) {
        Path::new("AppData").join("Local")
    } else {
        PathBuf::from(".config")
    };
    Some(home.join(config_folder).join(DEFAULT_CONFIG_DIRECTORY_NAME))
}

/// Look for the config file in the working directory first, then in the per-user directory.
pub fn search_config_file(cwd: &Path, home_dir: Option<&Path>) -> Option<PathBuf> {
    let at_cwd = cwd.join(DEFAULT_CONFIG_FILENAME);
    if at_cwd.is_file() {
        return Some(at_cwd);
    }
    let at_home = home_dir?.join(DEFAULT_CONFIG_FILENAME);
    at_home.is_file().then_some(at_home)
}

/// Resolve which document to use: an explicit path must exist, otherwise discovery
/// runs and built-in defaults apply when nothing is found.
pub fn resolve(explicit: Option<&Path>) -> Result<ConfigDoc> {
    if let Some(p) = explicit {
        return load(p);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::config(format!("cwd error: {e}")))?;
    match search_config_file(&cwd, home_config_dir().as_deref()) {
        Some(found) => {
            tracing::debug!(path = %found.display(), "using discovered config file");
            load(&found)
        }
        None => Ok(ConfigDoc::empty()),
    }
}
