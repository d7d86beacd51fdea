use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Error, ErrorKind, Result};

/// Blocking HTTP client wrapper. No timeout unless one is configured.
pub struct Downloader {
    client: reqwest::blocking::Client,
}

impl Downloader {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET `url` and buffer the whole body.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let res = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::transport(format!("HTTP download of {url} failed: {e}")))?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::transport(format!(
                "bad status from {url}: {} ({})",
                status
                    .canonical_reason()
                    .unwrap_or("unknown status"),
                status.as_u16()
            )));
        }
        let bytes = res
            .bytes()
            .map_err(|e| Error::transport(format!("HTTP body read from {url} failed: {e}")))?;
        debug!(url = %url, bytes = bytes.len(), "received response body");
        Ok(bytes.to_vec())
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Returns the computed digest. An empty `expected` skips the comparison.
pub fn verify_digest(data: &[u8], expected: &str) -> Result<String> {
    let computed = sha256_hex(data);
    let expected = expected.trim();
    if expected.is_empty() {
        return Ok(computed);
    }
    if !computed.eq_ignore_ascii_case(expected) {
        return Err(Error::integrity(format!(
            "unexpected SHA256 ({computed}) expected ({expected})"
        )));
    }
    Ok(computed)
}

/// Split a temp-file pattern on its last `*` into (prefix, suffix).
pub fn split_pattern(pattern: &str) -> (&str, &str) {
    match pattern.rfind('*') {
        Some(idx) => (&pattern[..idx], &pattern[idx + 1..]),
        None => (pattern, ""),
    }
}

/// A uniquely named file that outlives this process unless someone removes it.
#[derive(Debug)]
pub struct TempArchive {
    path: PathBuf,
    file: File,
}

impl TempArchive {
    pub fn create(dir: Option<&Path>, pattern: &str) -> Result<Self> {
        let (prefix, suffix) = split_pattern(pattern);
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix).suffix(suffix);
        let tmp = match dir {
            Some(d) => builder.tempfile_in(d),
            None => builder.tempfile(),
        }
        .map_err(|e| {
            Error::fs(format!(
                "failed to create temp file in {}: {e}",
                dir.map(|d| d.display().to_string())
                    .unwrap_or_else(|| std::env::temp_dir().display().to_string())
            ))
        })?;
        let (file, path) = tmp
            .keep()
            .map_err(|e| Error::fs(format!("failed to keep temp file: {e}")))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try each url in order. Only transport failures move on to the next url; a
    /// digest mismatch stops immediately. Nothing is written unless the digest matched.
    pub fn fill(mut self, downloader: &Downloader, urls: &[&str], expected: &str) -> Result<PathBuf> {
        if urls.is_empty() {
            return Err(Error::config("no source urls configured"));
        }
        if expected.trim().is_empty() {
            warn!("no sha256 configured; skipping integrity verification");
        }

        let mut last_err = None;
        for (i, url) in urls.iter().enumerate() {
            info!(url = %url, "downloading source archive");
            let body = match downloader.fetch(url) {
                Ok(body) => body,
                Err(e) if e.kind() == ErrorKind::Transport && i + 1 < urls.len() => {
                    warn!(url = %url, error = %e, "download failed, trying mirror");
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let digest = verify_digest(&body, expected)?;
            debug!(url = %url, sha256 = %digest, "download digest");

            self.file.write_all(&body).map_err(|e| {
                Error::fs(format!("failed to write {}: {e}", self.path.display()))
            })?;
            self.file.flush().map_err(|e| {
                Error::fs(format!("failed to flush {}: {e}", self.path.display()))
            })?;
            debug!(path = %self.path.display(), bytes = body.len(), "downloaded archive");
            return Ok(self.path);
        }

        Err(last_err.unwrap_or_else(|| Error::transport("download failed")))
    }
}

/// Library convenience for a single url with no timeout: download `url` into a fresh
/// temp file in `out_dir` named after `pattern`. The file is left on disk on failure
/// and its path is not returned then, so the build pipeline uses [`TempArchive`]
/// directly to learn the path before fetching.
pub fn download_file_as_temp(
    out_dir: Option<&Path>,
    pattern: &str,
    url: &str,
    sha256: &str,
) -> Result<PathBuf> {
    let tmp = TempArchive::create(out_dir, pattern)?;
    let downloader = Downloader::new(None)?;
    tmp.fill(&downloader, &[url], sha256)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn verify_digest_accepts_matching_digest_in_any_case() {
        assert_eq!(verify_digest(b"hello", HELLO_SHA256).expect("ok"), HELLO_SHA256);
        verify_digest(b"hello", &HELLO_SHA256.to_ascii_uppercase()).expect("uppercase ok");
    }

    #[test]
    fn verify_digest_reports_both_values_on_mismatch() {
        let wrong = "0".repeat(64);
        let err = verify_digest(b"hello", &wrong).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        let msg = err.to_string();
        assert!(msg.contains(HELLO_SHA256), "unexpected err: {msg}");
        assert!(msg.contains(&wrong), "unexpected err: {msg}");
    }

    #[test]
    fn empty_digest_skips_verification() {
        assert_eq!(verify_digest(b"anything", "").expect("skip"), sha256_hex(b"anything"));
        verify_digest(b"anything", "   ").expect("whitespace skip");
    }

    #[test]
    fn split_pattern_uses_last_star() {
        assert_eq!(split_pattern("*openvpn-2.5.1.tar.xz"), ("", "openvpn-2.5.1.tar.xz"));
        assert_eq!(split_pattern("pre*mid*.tar"), ("pre*mid", ".tar"));
        assert_eq!(split_pattern("plain"), ("plain", ""));
    }

    #[test]
    fn temp_archive_is_kept_with_pattern_suffix() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let archive = TempArchive::create(Some(tmp.path()), "*src.tar.xz").expect("create");
        let path = archive.path().to_path_buf();
        drop(archive);
        assert!(path.is_file());
        assert!(path.starts_with(tmp.path()));
        let name = path.file_name().and_then(|s| s.to_str()).expect("name");
        assert!(name.ends_with("src.tar.xz"), "unexpected name: {name}");
    }

    #[test]
    fn fill_with_no_urls_is_a_config_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let archive = TempArchive::create(Some(tmp.path()), "*x").expect("create");
        let downloader = Downloader::new(None).expect("client");
        let err = archive.fill(&downloader, &[], "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
