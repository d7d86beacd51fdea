use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use super::{Stage, StageStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StageStarted {
        stage: Stage,
    },
    StageFinished {
        stage: Stage,
        status: StageStatus,
        error: Option<String>,
        elapsed_ms: u128,
    },
    CleanupWarning {
        path: PathBuf,
        message: String,
    },
    PipelineDone {
        ok: bool,
        error: Option<String>,
    },
}

pub trait PipelineSink: Send + Sync {
    fn emit(&self, ev: PipelineEvent);
}

/// Forwards pipeline progress to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl PipelineSink for TracingSink {
    fn emit(&self, ev: PipelineEvent) {
        match ev {
            PipelineEvent::StageStarted { stage } => {
                info!(stage = stage.id(), "{}", stage.label());
            }
            PipelineEvent::StageFinished {
                stage,
                status: StageStatus::Completed,
                elapsed_ms,
                ..
            } => {
                info!(stage = stage.id(), elapsed_ms = elapsed_ms as u64, "stage finished");
            }
            PipelineEvent::StageFinished {
                stage,
                status,
                error: err,
                elapsed_ms,
            } => {
                error!(
                    stage = stage.id(),
                    fatal = (status == StageStatus::Fatal),
                    elapsed_ms = elapsed_ms as u64,
                    error = err.as_deref().unwrap_or_default(),
                    "stage failed"
                );
            }
            PipelineEvent::CleanupWarning { path, message } => {
                warn!(path = %path.display(), error = %message, "cleanup left an artifact behind");
            }
            PipelineEvent::PipelineDone { ok: true, .. } => info!("done"),
            // The caller reports the terminal error itself.
            PipelineEvent::PipelineDone { ok: false, error: err } => {
                debug!(error = err.as_deref().unwrap_or_default(), "pipeline finished with failure");
            }
        }
    }
}
