//! Stage sequencing for one build run.
//!
//! `Preflight → Download → Extract → Configure → Patch → Compile → Install → Cleanup`
//! then `Done` or `Failed`. Every path to a terminal state goes through `Cleanup`
//! exactly once; see [`transition`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cleanup::CleanupReport;
use crate::config::BuildConfig;
use crate::error::{Error, ErrorKind, Result};

mod host;
mod sink;

pub use host::HostStages;
pub use sink::{PipelineEvent, PipelineSink, TracingSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Preflight,
    Download,
    Extract,
    Configure,
    Patch,
    Compile,
    Install,
    Cleanup,
    Done,
    Failed,
}

impl Stage {
    /// Non-terminal stages in execution order.
    pub const SEQUENCE: [Stage; 8] = [
        Stage::Preflight,
        Stage::Download,
        Stage::Extract,
        Stage::Configure,
        Stage::Patch,
        Stage::Compile,
        Stage::Install,
        Stage::Cleanup,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Stage::Preflight => "preflight",
            Stage::Download => "download",
            Stage::Extract => "extract",
            Stage::Configure => "configure",
            Stage::Patch => "patch",
            Stage::Compile => "compile",
            Stage::Install => "install",
            Stage::Cleanup => "cleanup",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Preflight => "Check required host tools",
            Stage::Download => "Download and verify source archive",
            Stage::Extract => "Unpack archive into build directory",
            Stage::Configure => "Run ./configure",
            Stage::Patch => "Apply source patch",
            Stage::Compile => "Run make",
            Stage::Install => "Copy executable to destination",
            Stage::Cleanup => "Remove build directory and archive",
            Stage::Done => "Done",
            Stage::Failed => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    fn next_on_success(self) -> Stage {
        match self {
            Stage::Preflight => Stage::Download,
            Stage::Download => Stage::Extract,
            Stage::Extract => Stage::Configure,
            Stage::Configure => Stage::Patch,
            Stage::Patch => Stage::Compile,
            Stage::Compile => Stage::Install,
            Stage::Install => Stage::Cleanup,
            Stage::Cleanup => Stage::Done,
            Stage::Done => Stage::Done,
            Stage::Failed => Stage::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Completed,
    Recoverable,
    Fatal,
}

/// Outcome of one stage. Both failure variants abort the run and still go through
/// cleanup; fatal ones mean the environment or the input itself cannot be trusted.
#[derive(Debug)]
pub enum StageResult {
    Completed,
    Recoverable(Error),
    Fatal(Error),
}

impl StageResult {
    pub fn from_result(res: Result<()>) -> Self {
        match res {
            Ok(()) => StageResult::Completed,
            Err(e) => match e.kind() {
                ErrorKind::Environment | ErrorKind::Integrity | ErrorKind::Config => {
                    StageResult::Fatal(e)
                }
                ErrorKind::Transport | ErrorKind::Process | ErrorKind::Filesystem => {
                    StageResult::Recoverable(e)
                }
            },
        }
    }

    pub fn status(&self) -> StageStatus {
        match self {
            StageResult::Completed => StageStatus::Completed,
            StageResult::Recoverable(_) => StageStatus::Recoverable,
            StageResult::Fatal(_) => StageStatus::Fatal,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            StageResult::Completed => None,
            StageResult::Recoverable(e) | StageResult::Fatal(e) => Some(e),
        }
    }

    fn into_error(self) -> Option<Error> {
        match self {
            StageResult::Completed => None,
            StageResult::Recoverable(e) | StageResult::Fatal(e) => Some(e),
        }
    }
}

/// The one place that decides where a run goes next. `failed` is whether any
/// earlier stage failed; it only matters once cleanup has run.
pub fn transition(stage: Stage, status: StageStatus, failed: bool) -> Stage {
    match (stage, status) {
        (Stage::Done | Stage::Failed, _) => stage,
        (Stage::Cleanup, _) if failed => Stage::Failed,
        (Stage::Cleanup, _) => Stage::Done,
        (_, StageStatus::Completed) => stage.next_on_success(),
        (_, StageStatus::Recoverable | StageStatus::Fatal) => Stage::Cleanup,
    }
}

/// Paths produced while the run progresses. Lives for exactly one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineState {
    pub archive: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
    pub installed: Option<PathBuf>,
}

impl PipelineState {
    pub fn archive(&self) -> Result<&Path> {
        self.archive
            .as_deref()
            .ok_or_else(|| Error::config("pipeline state has no downloaded archive"))
    }

    pub fn build_dir(&self) -> Result<&Path> {
        self.build_dir
            .as_deref()
            .ok_or_else(|| Error::config("pipeline state has no build directory"))
    }
}

/// The work behind each stage. The orchestrator owns ordering and failure policy;
/// implementations only do the stage's job.
pub trait Stages {
    fn preflight(&mut self, cfg: &BuildConfig) -> Result<()>;
    fn download(&mut self, cfg: &BuildConfig, state: &mut PipelineState) -> Result<()>;
    fn extract(&mut self, cfg: &BuildConfig, state: &mut PipelineState) -> Result<()>;
    fn configure(&mut self, cfg: &BuildConfig, state: &PipelineState) -> Result<()>;
    fn patch(&mut self, cfg: &BuildConfig, state: &PipelineState) -> Result<()>;
    fn compile(&mut self, cfg: &BuildConfig, state: &PipelineState) -> Result<()>;
    fn install(&mut self, cfg: &BuildConfig, state: &mut PipelineState) -> Result<()>;
    fn cleanup(&mut self, cfg: &BuildConfig, state: &PipelineState) -> CleanupReport;
}

fn run_build_stage<S: Stages + ?Sized>(
    stages: &mut S,
    stage: Stage,
    cfg: &BuildConfig,
    state: &mut PipelineState,
) -> Result<()> {
    match stage {
        Stage::Preflight => stages.preflight(cfg),
        Stage::Download => stages.download(cfg, state),
        Stage::Extract => stages.extract(cfg, state),
        Stage::Configure => stages.configure(cfg, state),
        Stage::Patch => stages.patch(cfg, state),
        Stage::Compile => stages.compile(cfg, state),
        Stage::Install => stages.install(cfg, state),
        Stage::Cleanup | Stage::Done | Stage::Failed => Err(Error::config(format!(
            "'{}' is not a build stage",
            stage.id()
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: PipelineState,
    pub cleanup: CleanupReport,
}

/// Drive one run to a terminal state. Returns the first stage failure, prefixed
/// with the stage name, after cleanup has been attempted.
pub fn run_pipeline<S: Stages + ?Sized>(
    cfg: &BuildConfig,
    stages: &mut S,
    sink: &dyn PipelineSink,
) -> Result<RunReport> {
    let mut state = PipelineState::default();
    let mut cleanup = CleanupReport::default();
    let mut failure: Option<(Stage, Error)> = None;
    let mut stage = Stage::Preflight;

    loop {
        match stage {
            Stage::Done => {
                sink.emit(PipelineEvent::PipelineDone {
                    ok: true,
                    error: None,
                });
                return Ok(RunReport { state, cleanup });
            }
            Stage::Failed => {
                let err = match failure.take() {
                    Some((failed, e)) => e.context(format!("stage '{}' failed", failed.id())),
                    None => Error::config("pipeline failed without a recorded stage error"),
                };
                sink.emit(PipelineEvent::PipelineDone {
                    ok: false,
                    error: Some(err.to_string()),
                });
                return Err(err);
            }
            Stage::Cleanup => {
                sink.emit(PipelineEvent::StageStarted { stage });
                let start = Instant::now();
                cleanup = stages.cleanup(cfg, &state);
                for w in &cleanup.warnings {
                    sink.emit(PipelineEvent::CleanupWarning {
                        path: w.path.clone(),
                        message: w.message.clone(),
                    });
                }
                sink.emit(PipelineEvent::StageFinished {
                    stage,
                    status: StageStatus::Completed,
                    error: None,
                    elapsed_ms: start.elapsed().as_millis(),
                });
                stage = transition(stage, StageStatus::Completed, failure.is_some());
            }
            build => {
                sink.emit(PipelineEvent::StageStarted { stage: build });
                let start = Instant::now();
                let result =
                    StageResult::from_result(run_build_stage(stages, build, cfg, &mut state));
                let status = result.status();
                sink.emit(PipelineEvent::StageFinished {
                    stage: build,
                    status,
                    error: result.error().map(ToString::to_string),
                    elapsed_ms: start.elapsed().as_millis(),
                });
                if let Some(e) = result.into_error() {
                    failure = Some((build, e));
                }
                stage = transition(build, status, failure.is_some());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_walks_the_sequence_then_done() {
        let mut stage = Stage::Preflight;
        let mut seen = vec![stage];
        while !stage.is_terminal() {
            stage = transition(stage, StageStatus::Completed, false);
            seen.push(stage);
        }
        let mut expected = Stage::SEQUENCE.to_vec();
        expected.push(Stage::Done);
        assert_eq!(seen, expected);
    }

    #[test]
    fn any_failure_routes_through_cleanup() {
        for stage in Stage::SEQUENCE.into_iter().filter(|s| *s != Stage::Cleanup) {
            assert_eq!(transition(stage, StageStatus::Fatal, true), Stage::Cleanup);
            assert_eq!(transition(stage, StageStatus::Recoverable, true), Stage::Cleanup);
        }
        assert_eq!(transition(Stage::Cleanup, StageStatus::Completed, true), Stage::Failed);
        assert_eq!(transition(Stage::Cleanup, StageStatus::Completed, false), Stage::Done);
    }

    #[test]
    fn terminal_states_are_sticky() {
        assert_eq!(transition(Stage::Done, StageStatus::Fatal, true), Stage::Done);
        assert_eq!(transition(Stage::Failed, StageStatus::Completed, false), Stage::Failed);
    }

    #[test]
    fn error_kinds_map_to_severity() {
        let fatal = StageResult::from_result(Err(Error::integrity("bad digest")));
        assert_eq!(fatal.status(), StageStatus::Fatal);
        let fatal = StageResult::from_result(Err(Error::environment("no make")));
        assert_eq!(fatal.status(), StageStatus::Fatal);
        let rec = StageResult::from_result(Err(Error::process("exit 2")));
        assert_eq!(rec.status(), StageStatus::Recoverable);
        let rec = StageResult::from_result(Err(Error::transport("404")));
        assert_eq!(rec.status(), StageStatus::Recoverable);
        assert_eq!(StageResult::from_result(Ok(())).status(), StageStatus::Completed);
    }

    #[test]
    fn state_accessors_require_populated_fields() {
        let mut state = PipelineState::default();
        assert!(state.archive().is_err());
        assert!(state.build_dir().is_err());
        state.build_dir = Some(PathBuf::from("/tmp/aws-openvpn"));
        assert_eq!(state.build_dir().expect("dir"), Path::new("/tmp/aws-openvpn"));
    }
}
