use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use serde_json::json;
use tracing::{debug, error, level_filters::LevelFilter};
use voxdiff::{compare, CompareParams, ComparisonResult, PointBudget};

/// Exit status for every failure, whatever its cause.
const FAILURE: u8 = 2;

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "voxdiff", version, about = "Occupancy volume change between two point-cloud scans")]
struct Args {
    /// Earlier scan (.ply, .pcd, .las, .laz, .e57, or no extension)
    #[arg(long)]
    t1: PathBuf,

    /// Later scan
    #[arg(long)]
    t2: PathBuf,

    /// Voxel edge length in meters
    #[arg(long, default_value_t = voxdiff::DEFAULT_VOXEL_SIZE, allow_negative_numbers = true)]
    voxel: f64,

    /// Points kept per scan before voxelization; 0 or negative keeps all
    #[arg(long = "max_points", default_value_t = voxdiff::DEFAULT_MAX_POINTS, allow_negative_numbers = true)]
    max_points: i64,

    /// Seed for the point-budget subsampling
    #[arg(long)]
    seed: Option<u64>,

    /// Log verbosity on stderr
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

impl Args {
    fn params(&self) -> CompareParams {
        CompareParams {
            voxel_size: self.voxel,
            budget: PointBudget::from_limit(self.max_points),
            seed: self.seed,
        }
    }
}

fn init_tracing(level: LogLevel) {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_max_level(LevelFilter::from(level))
        .finish();
    // only fails when a global subscriber is already installed
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Route panic reports through the subscriber instead of raw stderr text.
fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| l.to_string()).unwrap_or_default();
        error!(%location, "panic: {}", panic_message(info.payload()));
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `f`, turning a panic into an ordinary error.
fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(anyhow!("internal error: {}", panic_message(&*payload))))
}

/// The message part of a clap error: everything before the usage block,
/// on one line.
fn clap_summary(rendered: &str) -> String {
    let lines: Vec<&str> = rendered
        .lines()
        .take_while(|line| !line.trim().is_empty())
        .map(str::trim)
        .collect();
    lines.join(" ").trim_start_matches("error: ").to_string()
}

fn run(args: &Args) -> Result<ComparisonResult> {
    debug!(?args, "starting comparison");
    Ok(compare(&args.t1, &args.t2, &args.params())?)
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    println!("{}", json!({ "error": message.to_string() }));
    ExitCode::from(FAILURE)
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => err.exit(),
        Err(err) => {
            return fail(clap_summary(&err.to_string()));
        }
    };

    init_tracing(args.log_level);
    install_panic_hook();

    match guarded(|| run(&args)) {
        Ok(result) => match serde_json::to_string(&result) {
            Ok(out) => {
                println!("{out}");
                ExitCode::SUCCESS
            }
            Err(err) => fail(err),
        },
        Err(err) => fail(format!("{err:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panics_become_internal_errors() {
        let err = guarded::<()>(|| panic!("decoder blew up")).unwrap_err();
        assert_eq!(err.to_string(), "internal error: decoder blew up");

        let err = guarded::<()>(|| panic::panic_any(7u8)).unwrap_err();
        assert_eq!(err.to_string(), "internal error: unknown panic");
    }

    #[test]
    fn guarded_passes_results_through() {
        assert_eq!(guarded(|| Ok(3)).unwrap(), 3);
        let err = guarded::<()>(|| Err(anyhow!("plain failure"))).unwrap_err();
        assert_eq!(err.to_string(), "plain failure");
    }

    #[test]
    fn clap_summary_keeps_the_missing_flag() {
        let rendered = "error: the following required arguments were not provided:\n  --t2 <T2>\n\n\
                        Usage: voxdiff --t1 <T1> --t2 <T2>\n\nFor more information, try '--help'.\n";
        assert_eq!(
            clap_summary(rendered),
            "the following required arguments were not provided: --t2 <T2>"
        );
    }

    #[test]
    fn missing_argument_is_reported_by_name() {
        let err = Args::try_parse_from(["voxdiff", "--t1", "a.ply"]).unwrap_err();
        assert!(clap_summary(&err.to_string()).contains("--t2"));
    }
}
