use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use openvpn_builder::config::{self, BuildConfig, Overrides};
use openvpn_builder::pipeline::{self, HostStages, Stage, TracingSink};
use openvpn_builder::{Error, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Log debug events (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, clap::Args)]
struct ConfigArgs {
    /// Path to a config TOML (default: discovered in the working or per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for the downloaded archive (default: system temp directory)
    #[arg(long = "tmp-dir")]
    tmp_dir: Option<PathBuf>,
    /// Expected SHA-256 of the source archive (empty skips verification)
    #[arg(long)]
    sha256: Option<String>,
    /// Where to install the built executable
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download, patch, compile and install the OpenVPN executable
    Build {
        #[command(flatten)]
        cfg: ConfigArgs,
    },
    /// Only check that the required host tools are installed
    Check {
        #[command(flatten)]
        cfg: ConfigArgs,
    },
    /// Print the resolved configuration and the stage sequence
    Plan {
        #[command(flatten)]
        cfg: ConfigArgs,
    },
    /// Open the OpenVPN community support page in the default browser
    Support,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.log_format);
    let res = match args.cmd {
        Command::Build { cfg } => cmd_build(&cfg),
        Command::Check { cfg } => cmd_check(&cfg),
        Command::Plan { cfg } => cmd_plan(&cfg),
        Command::Support => openvpn_builder::browser::open_default_browser(config::SUPPORT_URL),
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.kind().as_str(), "{}", failure_line(&e));
            ExitCode::FAILURE
        }
    }
}

/// The one line reported when a command fails.
fn failure_line(err: &Error) -> String {
    format!("{} error: {}", err.kind().as_str(), err.message())
}

fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(args: &ConfigArgs) -> Result<BuildConfig> {
    let doc = config::resolve(args.config.as_deref())?;
    BuildConfig::from_doc(
        &doc,
        Overrides {
            temp_dir: args.tmp_dir.clone(),
            sha256: args.sha256.clone(),
            dest: args.out.clone(),
        },
    )
}

fn cmd_build(args: &ConfigArgs) -> Result<()> {
    let cfg = load_config(args)?;
    tracing::info!("creating ready openvpn binary");
    let report = pipeline::run_pipeline(&cfg, &mut HostStages, &TracingSink)?;
    if let Some(dest) = report.state.installed.as_deref() {
        tracing::info!(dest = %dest.display(), "successfully compiled and copied openvpn executable");
    }
    Ok(())
}

fn cmd_check(args: &ConfigArgs) -> Result<()> {
    let cfg = load_config(args)?;
    openvpn_builder::preflight::check_tools(&cfg.tools)?;
    tracing::info!(tools = cfg.tools.len(), "all required tools found");
    Ok(())
}

fn cmd_plan(args: &ConfigArgs) -> Result<()> {
    let cfg = load_config(args)?;
    println!("source:      {}", cfg.source_url);
    if let Some(m) = cfg.mirror_url.as_deref() {
        println!("mirror:      {m}");
    }
    println!(
        "sha256:      {}",
        if cfg.expected_sha256.is_empty() {
            "<not verified>"
        } else {
            cfg.expected_sha256.as_str()
        }
    );
    println!("build dir:   {}", cfg.build_dir().display());
    println!("patch:       {}", cfg.patch_file.display());
    println!("artifact:    {}", cfg.artifact.display());
    println!("install to:  {}", cfg.dest.display());
    println!();
    for (i, stage) in Stage::SEQUENCE.iter().enumerate() {
        println!("{:>2}. {:<10}  {}", i + 1, stage.id(), stage.label());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use openvpn_builder::ErrorKind;

    #[test]
    fn failure_line_is_kind_and_message_only() {
        let err = Error::process("configure broke").context("stage 'configure' failed");
        assert_eq!(
            failure_line(&err),
            "process error: stage 'configure' failed: configure broke"
        );
        let err = Error::new(ErrorKind::Integrity, "unexpected SHA256 (a) expected (b)");
        assert!(!failure_line(&err).contains("Error {"));
    }

    #[test]
    fn build_flags_parse_into_overrides() {
        let args = Args::try_parse_from([
            "openvpn-builder",
            "build",
            "--tmp-dir",
            "/var/tmp",
            "--sha256",
            "abc",
            "--out",
            "./bin/openvpn",
        ])
        .expect("parse");
        let Command::Build { cfg } = args.cmd else {
            panic!("expected build subcommand");
        };
        assert_eq!(cfg.tmp_dir, Some(PathBuf::from("/var/tmp")));
        assert_eq!(cfg.sha256.as_deref(), Some("abc"));
        assert_eq!(cfg.out, Some(PathBuf::from("./bin/openvpn")));
    }
}
