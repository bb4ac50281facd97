//! Cascade replay tool
//!
//! Usage:
//!   replay play <outcome.json>     - Replay headless and print the event trace
//!   replay verify <outcome.json>   - Check determinism and win accounting
//!   replay layout                  - Print resolved board metrics

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use rf_outcome::{BoardShape, Outcome};
use rf_replay::{
    ContainerSize, EventRecorder, FillMode, ReplayConfig, ReplayController, ReplayTrace, RunSummary, TimingConfig,
    TimingProfile, resolve_metrics,
};

#[derive(Parser)]
#[command(name = "replay", about = "Cascade replay tools")]
struct Cli {
    /// Config file (.json, .yaml, .yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an outcome and print its event trace as JSON
    Play {
        outcome: PathBuf,
        /// Fill mode (replace, cascade, reel-spin)
        #[arg(short, long)]
        mode: Option<FillMode>,
        /// Timing profile (normal, turbo, instant)
        #[arg(short, long)]
        profile: Option<TimingProfile>,
        /// Pretty-print the trace
        #[arg(long)]
        pretty: bool,
    },
    /// Replay an outcome twice per fill mode and check the results agree
    Verify {
        outcome: PathBuf,
        /// Only verify this fill mode
        #[arg(short, long)]
        mode: Option<FillMode>,
    },
    /// Print the metrics resolved for a board and container
    Layout {
        #[arg(long, default_value_t = 3)]
        rows: usize,
        #[arg(long, default_value_t = 5)]
        cols: usize,
        #[arg(long, default_value_t = 800.0)]
        width: f64,
        #[arg(long, default_value_t = 600.0)]
        height: f64,
    },
}

#[derive(Serialize)]
struct PlayReport {
    fill_mode: FillMode,
    summary: Option<RunSummary>,
    trace: ReplayTrace,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            outcome,
            mode,
            profile,
            pretty,
        } => play(config, &outcome, mode, profile, pretty),
        Commands::Verify { outcome, mode } => verify(config, &outcome, mode),
        Commands::Layout {
            rows,
            cols,
            width,
            height,
        } => layout(&config, rows, cols, width, height),
    }
}

fn load_config(path: Option<&Path>) -> Result<ReplayConfig> {
    match path {
        Some(path) => ReplayConfig::load(path).with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ReplayConfig::default()),
    }
}

fn load_outcome(path: &Path) -> Result<Outcome> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Outcome::from_json(&json).with_context(|| format!("Failed to parse outcome {}", path.display()))
}

/// Replay once and return the recorded trace with the run summary
fn run_once(config: ReplayConfig, outcome: Outcome) -> Result<(ReplayTrace, Option<RunSummary>)> {
    let mut controller = ReplayController::headless(config).context("Invalid replay config")?;
    let recorder = EventRecorder::new();
    controller.add_observer(Box::new(recorder.clone()));

    controller.submit(outcome);
    let elapsed = controller.run_until_idle();
    log::info!("Replay finished after {}ms virtual time", elapsed);

    Ok((recorder.take(), controller.session().last_summary.clone()))
}

fn play(
    mut config: ReplayConfig,
    outcome_path: &Path,
    mode: Option<FillMode>,
    profile: Option<TimingProfile>,
    pretty: bool,
) -> Result<()> {
    if let Some(mode) = mode {
        config.fill_mode = mode;
    }
    if let Some(profile) = profile {
        config.timing = TimingConfig::from_profile(profile);
    }
    let outcome = load_outcome(outcome_path)?;

    let fill_mode = config.fill_mode;
    let (trace, summary) = run_once(config, outcome)?;
    let report = PlayReport {
        fill_mode,
        summary,
        trace,
    };

    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}

fn verify(config: ReplayConfig, outcome_path: &Path, mode: Option<FillMode>) -> Result<()> {
    let json = std::fs::read_to_string(outcome_path)
        .with_context(|| format!("Failed to read {}", outcome_path.display()))?;
    let (normalized, report) = Outcome::from_json_normalized(&json, config.board)
        .with_context(|| format!("Failed to parse outcome {}", outcome_path.display()))?;
    let outcome = Outcome::from_json(&json)?;
    let modes = match mode {
        Some(mode) => vec![mode],
        None => FillMode::ALL.to_vec(),
    };

    if !report.is_clean() {
        println!("! outcome needed {} correction(s): {:?}", report.total_faults(), report);
    }
    let expected_win = normalized.match_win_sum();

    let mut failures = 0;
    for mode in modes {
        let run_config = config.clone().with_fill_mode(mode);
        let (first, summary) = run_once(run_config.clone(), outcome.clone())?;
        let (second, _) = run_once(run_config, outcome.clone())?;

        let deterministic = first.same_timeline(&second);
        let win_ok = (first.win_total() - expected_win).abs() <= 1e-9;
        let completed = first.completions() == 1;
        let total_ok = summary.as_ref().is_some_and(RunSummary::win_matches);

        let status = if deterministic && win_ok && completed { "ok" } else { "FAILED" };
        println!(
            "{:<10} {:<6} events={} win={} deterministic={} completed={}{}",
            mode.as_str(),
            status,
            first.events.len(),
            first.win_total(),
            deterministic,
            completed,
            if total_ok { "" } else { " (total_win mismatch)" }
        );
        if status != "ok" {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} fill mode(s) failed verification", failures);
    }
    Ok(())
}

fn layout(config: &ReplayConfig, rows: usize, cols: usize, width: f64, height: f64) -> Result<()> {
    if rows == 0 || cols == 0 {
        bail!("Board must have at least one row and one column");
    }
    let metrics = resolve_metrics(
        BoardShape::new(rows, cols),
        ContainerSize::new(width, height),
        &config.layout,
    );
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
