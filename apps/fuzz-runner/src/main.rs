use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use core_session::SessionConfig;
use fuzz_engine::replay::{self, ReplayCase};
use fuzz_engine::{FuzzConfig, Fuzzer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod metrics;
mod results;

use results::{ANOMALIES_FILE, SUMMARY_FILE};

#[derive(Parser, Debug)]
#[command(name = "fuzz-runner", version, about = "Stateful mutation fuzzer for the L2CAP-style signaling session")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a fuzzing campaign and write summary.json + anomalies.jsonl
    Run(RunArgs),
    /// Replay recorded reproducers against the deliberately flawed session
    Replay(ReplayArgs),
    /// Derive rates and breakdowns from a finished run
    Metrics(MetricsArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Number of trials (overrides config and FUZZ_TRIALS)
    #[arg(long)]
    trials: Option<u64>,
    /// RNG seed (overrides config and FUZZ_SEED)
    #[arg(long)]
    seed: Option<u64>,
    /// Optional TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory
    #[arg(long, default_value = "results")]
    out: PathBuf,
    /// Cap Configuring frames at 64 bytes
    #[arg(long, default_value_t = false)]
    hardened: bool,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// JSONL file with anomaly records
    #[arg(long, default_value = "results/anomalies.jsonl")]
    file: PathBuf,
    /// Append the built-in reproducers for each injected flaw
    #[arg(long, default_value_t = false)]
    with_demo: bool,
    /// Write the impact report as JSON here
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MetricsArgs {
    /// Directory holding summary.json and anomalies.jsonl
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,
    /// Where metrics.json and metrics.md go (defaults to the results dir)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Replay(args) => cmd_replay(args),
        Commands::Metrics(args) => cmd_metrics(args),
    }
}

fn load_config(args: &RunArgs) -> Result<FuzzConfig> {
    let mut cfg = match &args.config {
        Some(path) => FuzzConfig::from_file(path)?,
        None => FuzzConfig::default(),
    };
    cfg.apply_env()?;
    if let Some(t) = args.trials {
        cfg.trials = t;
    }
    if let Some(s) = args.seed {
        cfg.seed = s;
    }
    if args.hardened {
        cfg.session.max_config_frame = SessionConfig::hardened().max_config_frame;
    }
    Ok(cfg)
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let cfg = load_config(&args)?;
    let trials = cfg.trials;
    let mut fz = Fuzzer::try_new(cfg)?;
    let summary = fz.run(trials);

    results::write_summary(&args.out.join(SUMMARY_FILE), &summary)?;
    results::write_anomalies(&args.out.join(ANOMALIES_FILE), fz.anomalies())?;

    println!("=== FUZZ SUMMARY ===");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!(out = %args.out.display(), "results written");
    Ok(())
}

fn cmd_replay(args: ReplayArgs) -> Result<()> {
    let records = results::load_anomalies(&args.file)?;
    let mut cases: Vec<ReplayCase> = records.iter().filter_map(ReplayCase::from_record).collect();
    if args.with_demo {
        cases.extend(replay::demo_cases());
    }
    if cases.is_empty() {
        return Err(anyhow!("no cases to replay in {:?} (try --with-demo)", args.file));
    }

    let report = replay::replay(&cases, SessionConfig::default());
    println!("=== IMPACT REPORT ===");
    println!("{}", serde_json::to_string_pretty(&report)?);
    if let Some(out) = &args.out {
        results::write_json(out, &report)?;
    }
    Ok(())
}

fn cmd_metrics(args: MetricsArgs) -> Result<()> {
    let summary = results::read_summary(&args.results_dir.join(SUMMARY_FILE))
        .context("metrics need a finished run")?;
    let records = results::load_anomalies(&args.results_dir.join(ANOMALIES_FILE))?;
    let m = metrics::compute(&summary, &records);

    let out_dir = args.out_dir.unwrap_or(args.results_dir);
    results::write_json(&out_dir.join("metrics.json"), &m)?;
    let md = metrics::to_markdown(&m);
    let md_path = out_dir.join("metrics.md");
    std::fs::write(&md_path, &md).with_context(|| format!("write {:?}", md_path))?;

    println!("{md}");
    Ok(())
}
