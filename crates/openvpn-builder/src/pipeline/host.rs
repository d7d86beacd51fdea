use tracing::debug;

use super::{PipelineState, Stages};
use crate::cleanup::{self, CleanupReport};
use crate::config::BuildConfig;
use crate::download::{Downloader, TempArchive};
use crate::error::Result;
use crate::{extract, install, preflight, toolchain};

/// Stages backed by the real host: PATH lookups, HTTP, tar, configure, patch, make.
#[derive(Debug, Default)]
pub struct HostStages;

impl Stages for HostStages {
    fn preflight(&mut self, cfg: &BuildConfig) -> Result<()> {
        preflight::check_tools(&cfg.tools)
    }

    fn download(&mut self, cfg: &BuildConfig, state: &mut PipelineState) -> Result<()> {
        let tmp = TempArchive::create(cfg.temp_dir.as_deref(), &cfg.archive_pattern)?;
        // Recorded before fetching so cleanup sees the file even if the download fails.
        state.archive = Some(tmp.path().to_path_buf());
        debug!(url = %cfg.source_url, sha256 = %cfg.expected_sha256, "downloading OpenVPN");
        let downloader = Downloader::new(cfg.http_timeout)?;
        let path = tmp.fill(&downloader, &cfg.source_urls(), &cfg.expected_sha256)?;
        debug!(archive = %path.display(), "downloaded tar file");
        Ok(())
    }

    fn extract(&mut self, cfg: &BuildConfig, state: &mut PipelineState) -> Result<()> {
        let archive = state.archive()?.to_path_buf();
        // Recorded before tar runs so a partial tree is still cleaned up.
        state.build_dir = Some(extract::extract_target(&cfg.build_root, &cfg.top_level_dir));
        extract::extract_archive(&archive, &cfg.build_root, &cfg.top_level_dir)?;
        Ok(())
    }

    fn configure(&mut self, cfg: &BuildConfig, state: &PipelineState) -> Result<()> {
        toolchain::configure(state.build_dir()?, &cfg.configure_flags)
    }

    fn patch(&mut self, cfg: &BuildConfig, state: &PipelineState) -> Result<()> {
        toolchain::apply_patch(state.build_dir()?, &cfg.patch_file)
    }

    fn compile(&mut self, _cfg: &BuildConfig, state: &PipelineState) -> Result<()> {
        toolchain::compile(state.build_dir()?)
    }

    fn install(&mut self, cfg: &BuildConfig, state: &mut PipelineState) -> Result<()> {
        install::install_artifact(
            state.build_dir()?,
            &cfg.artifact,
            &cfg.dest,
            cfg.copy_buffer_size,
        )?;
        state.installed = Some(cfg.dest.clone());
        Ok(())
    }

    fn cleanup(&mut self, _cfg: &BuildConfig, state: &PipelineState) -> CleanupReport {
        cleanup::cleanup(state.build_dir.as_deref(), state.archive.as_deref())
    }
}
