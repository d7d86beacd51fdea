use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::ConfigDoc;
use crate::error::{Error, Result};
use crate::preflight::ToolRequirement;

pub const SUPPORT_URL: &str = "https://openvpn.net/community/";
pub const DEFAULT_SOURCE_URL: &str =
    "https://swupdate.openvpn.org/community/releases/openvpn-2.5.1.tar.xz";
pub const DEFAULT_MIRROR_URL: &str =
    "https://build.openvpn.net/downloads/releases/openvpn-2.5.1.tar.xz";
pub const DEFAULT_ARCHIVE_PATTERN: &str = "*openvpn-2.5.1.tar.xz";
pub const DEFAULT_BUILD_ROOT: &str = "/tmp";
pub const DEFAULT_TOP_LEVEL_DIR: &str = "aws-openvpn";
pub const DEFAULT_PATCH_FILE: &str = "scripts/openvpn-v2.5.1-aws.patch";
pub const DEFAULT_ARTIFACT: &str = "src/openvpn/openvpn";
pub const DEFAULT_DEST: &str = "./openvpn";
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 5120;

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.into()
}

fn default_mirror_url() -> Option<String> {
    Some(DEFAULT_MIRROR_URL.into())
}

fn default_archive_pattern() -> String {
    DEFAULT_ARCHIVE_PATTERN.into()
}

fn default_build_root() -> String {
    DEFAULT_BUILD_ROOT.into()
}

fn default_top_level_dir() -> String {
    DEFAULT_TOP_LEVEL_DIR.into()
}

fn default_patch_file() -> String {
    DEFAULT_PATCH_FILE.into()
}

fn default_configure_flags() -> Vec<String> {
    [
        "--disable-debug",
        "--disable-dependency-tracking",
        "--disable-silent-rules",
        "--with-crypto-library=openssl",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_artifact() -> String {
    DEFAULT_ARTIFACT.into()
}

fn default_dest() -> String {
    DEFAULT_DEST.into()
}

fn default_buffer_size() -> usize {
    DEFAULT_COPY_BUFFER_SIZE
}

fn default_tools() -> Vec<ToolRequirement> {
    vec![
        ToolRequirement::new("tar", "Please install tar to continue."),
        ToolRequirement::new("patch", "Please install patch to continue."),
        ToolRequirement::new(
            "make",
            "Please install build-essential or your distribution's development tools to continue.",
        ),
    ]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_mirror_url")]
    pub mirror_url: Option<String>,
    pub sha256: String,
    #[serde(default = "default_archive_pattern")]
    pub archive_pattern: String,
    /// 0 disables the timeout.
    pub timeout_secs: u64,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            mirror_url: default_mirror_url(),
            sha256: String::new(),
            archive_pattern: default_archive_pattern(),
            timeout_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    #[serde(default = "default_build_root")]
    pub root: String,
    #[serde(default = "default_top_level_dir")]
    pub top_level_dir: String,
    #[serde(default = "default_patch_file")]
    pub patch_file: String,
    #[serde(default = "default_configure_flags")]
    pub configure_flags: Vec<String>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            root: default_build_root(),
            top_level_dir: default_top_level_dir(),
            patch_file: default_patch_file(),
            configure_flags: default_configure_flags(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstallSection {
    #[serde(default = "default_artifact")]
    pub artifact: String,
    #[serde(default = "default_dest")]
    pub dest: String,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for InstallSection {
    fn default() -> Self {
        Self {
            artifact: default_artifact(),
            dest: default_dest(),
            buffer_size: default_buffer_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreflightSection {
    #[serde(default = "default_tools")]
    pub tools: Vec<ToolRequirement>,
}

impl Default for PreflightSection {
    fn default() -> Self {
        Self {
            tools: default_tools(),
        }
    }
}

/// Values supplied on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub temp_dir: Option<PathBuf>,
    pub sha256: Option<String>,
    pub dest: Option<PathBuf>,
}

/// Everything one run needs. Built once, then only borrowed.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub source_url: String,
    pub mirror_url: Option<String>,
    /// Lowercase hex SHA-256; empty skips verification.
    pub expected_sha256: String,
    pub archive_pattern: String,
    pub http_timeout: Option<Duration>,
    pub build_root: PathBuf,
    pub top_level_dir: String,
    pub patch_file: PathBuf,
    pub configure_flags: Vec<String>,
    /// Relative to the extracted build directory.
    pub artifact: PathBuf,
    pub dest: PathBuf,
    pub copy_buffer_size: usize,
    pub temp_dir: Option<PathBuf>,
    pub tools: Vec<ToolRequirement>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::from_sections(
            SourceSection::default(),
            BuildSection::default(),
            InstallSection::default(),
            PreflightSection::default(),
        )
    }
}

impl BuildConfig {
    pub fn from_doc(doc: &ConfigDoc, overrides: Overrides) -> Result<Self> {
        let source: SourceSection = doc.deserialize_path("source")?.unwrap_or_default();
        let build: BuildSection = doc.deserialize_path("build")?.unwrap_or_default();
        let install: InstallSection = doc.deserialize_path("install")?.unwrap_or_default();
        let preflight: PreflightSection = doc.deserialize_path("preflight")?.unwrap_or_default();

        let mut cfg = Self::from_sections(source, build, install, preflight);
        if let Some(dir) = overrides.temp_dir {
            cfg.temp_dir = Some(dir);
        }
        if let Some(sha) = overrides.sha256 {
            cfg.expected_sha256 = normalize_digest(&sha);
        }
        if let Some(dest) = overrides.dest {
            cfg.dest = dest;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_sections(
        source: SourceSection,
        build: BuildSection,
        install: InstallSection,
        preflight: PreflightSection,
    ) -> Self {
        let mirror_url = source
            .mirror_url
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self {
            source_url: source.url.trim().to_string(),
            mirror_url,
            expected_sha256: normalize_digest(&source.sha256),
            archive_pattern: source.archive_pattern,
            http_timeout: (source.timeout_secs > 0)
                .then(|| Duration::from_secs(source.timeout_secs)),
            build_root: PathBuf::from(build.root.trim()),
            top_level_dir: build.top_level_dir.trim().to_string(),
            patch_file: PathBuf::from(build.patch_file.trim()),
            configure_flags: build.configure_flags,
            artifact: PathBuf::from(install.artifact.trim()),
            dest: PathBuf::from(install.dest.trim()),
            copy_buffer_size: install.buffer_size,
            temp_dir: None,
            tools: preflight.tools,
        }
    }

    /// `<build_root>/<top_level_dir>`; the extractor records this in the pipeline state.
    pub fn build_dir(&self) -> PathBuf {
        self.build_root.join(&self.top_level_dir)
    }

    /// Download candidates in the order they are tried.
    pub fn source_urls(&self) -> Vec<&str> {
        let mut urls = vec![self.source_url.as_str()];
        if let Some(m) = self.mirror_url.as_deref()
            && m != self.source_url
        {
            urls.push(m);
        }
        urls
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_url.is_empty() {
            return Err(Error::config("source.url is empty"));
        }
        if self.build_root.as_os_str().is_empty() {
            return Err(Error::config("build.root is empty"));
        }
        validate_dir_name(&self.top_level_dir)?;
        if self.patch_file.as_os_str().is_empty() {
            return Err(Error::config("build.patch_file is empty"));
        }
        if self.artifact.as_os_str().is_empty() || self.artifact.is_absolute() {
            return Err(Error::config(format!(
                "install.artifact '{}' must be a relative path inside the build directory",
                self.artifact.display()
            )));
        }
        if self
            .artifact
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(Error::config(format!(
                "install.artifact '{}' contains '..'",
                self.artifact.display()
            )));
        }
        if self.dest.as_os_str().is_empty() {
            return Err(Error::config("install.dest is empty"));
        }
        if self.copy_buffer_size == 0 {
            return Err(Error::config("install.buffer_size must be greater than zero"));
        }
        if !self.expected_sha256.is_empty()
            && (self.expected_sha256.len() != 64
                || !self.expected_sha256.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(Error::config(format!(
                "source.sha256 '{}' is not a hex-encoded SHA-256 digest",
                self.expected_sha256
            )));
        }
        for tool in &self.tools {
            if tool.name.trim().is_empty() {
                return Err(Error::config("preflight.tools[].name is empty"));
            }
        }
        Ok(())
    }
}

fn normalize_digest(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

fn validate_dir_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::config("build.top_level_dir is empty"));
    }
    let p = Path::new(name);
    let mut comps = p.components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(Error::config(format!(
            "build.top_level_dir '{}' must be a single directory name",
            name
        ))),
    }
}
