//! pantilt-calib CLI: calibrate against the reference gimbal and replay an image contour.

use clap::{Parser, Subcommand};
use pantilt_calib::replay::replay_config;
use pantilt_calib::session::CalibrationConfig;
use std::path::PathBuf;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "pantilt-calib")]
#[command(about = "Estimate an image -> pan/tilt homography and replay image contours through it")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace). Overrides PANTILT_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate from a JSON config and replay the image contour, writing a JSON report.
    Replay {
        /// Path to the JSON config.
        config: PathBuf,

        /// Where to write the report. Defaults to the config's `output_path`.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Stop after this many scheduling ticks even if the contour is not exhausted.
        #[arg(long)]
        max_ticks: Option<usize>,
    },

    /// Write a config with every default filled in.
    InitConfig {
        /// Destination of the JSON config.
        path: PathBuf,

        /// Image whose contours will be replayed.
        #[arg(long)]
        image: String,
    },
}

fn init_logging(level: Option<&str>) {
    #[cfg(feature = "tracing")]
    {
        let _ = level;
        pantilt_calib::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        use pantilt_calib::core::{parse_level, LOG_ENV};

        let raw = level
            .map(str::to_owned)
            .or_else(|| std::env::var(LOG_ENV).ok());
        let level = parse_level(raw.as_deref(), log::LevelFilter::Info);
        if let Err(e) = pantilt_calib::core::init_with_level(level) {
            eprintln!("failed to install logger: {e}");
        }
    }
}

fn run_replay(config: PathBuf, output: Option<PathBuf>, max_ticks: Option<usize>) -> CliResult<()> {
    let cfg = CalibrationConfig::load_json(&config)?;
    let report = replay_config(&cfg, max_ticks)?;
    let out = output.unwrap_or_else(|| cfg.output_path());
    report.write_json(&out)?;
    println!(
        "wrote {} ({} emitted, {} skipped, {} ticks)",
        out.display(),
        report.emitted.len(),
        report.skipped,
        report.ticks
    );
    match report.error {
        Some(e) => Err(format!("calibration failed: {e}").into()),
        None => Ok(()),
    }
}

fn run_init_config(path: PathBuf, image: String) -> CliResult<()> {
    let cfg = CalibrationConfig::new(image);
    cfg.write_json(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn try_main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());
    match cli.command {
        Commands::Replay {
            config,
            output,
            max_ticks,
        } => run_replay(config, output, max_ticks),
        Commands::InitConfig { path, image } => run_init_config(path, image),
    }
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
