#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that writes Poisson inter-trial interval schedules.

mod output;

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{BufWriter, Write},
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use poisson_iti_core::{IntervalRequest, RetryPolicy, DEFAULT_BIN_COUNT, DEFAULT_TOLERANCE};
use poisson_iti_system_blocks::{generate_session, BlockPlan};
use poisson_iti_system_sampler::{density, IntervalGenerator};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

/// Generate trial intervals/timings according to an approximate Poisson process.
#[derive(Debug, Parser)]
#[command(name = "poisson-iti", version)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
    #[command(flatten)]
    run: RunOptions,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Generate a single block of intervals.
    Generate(GenerateArgs),
    /// Generate every block listed in a JSON session plan.
    Session(SessionArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Number of trials.
    n: usize,
    /// Minimum iti (s).
    min: f64,
    /// Mean iti (s).
    mean: f64,
    /// Maximum iti (s).
    max: f64,
    /// Output name; `.csv` is appended.
    out: PathBuf,
    /// Number of bins for histogram fitting.
    #[arg(long, default_value_t = DEFAULT_BIN_COUNT)]
    bins: u32,
    /// Time to wait before trials (s).
    #[arg(long, default_value_t = 0.0)]
    delay: f64,
    /// Frame duration (s). Adds rounded frame columns to the output.
    #[arg(long)]
    tr: Option<f64>,
    /// Acceptable difference between requested iti limits and optimized ones.
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tol: f64,
    /// Also write `<out>_hist.csv` comparing the fitted and target densities.
    #[arg(long)]
    histogram: bool,
}

#[derive(Debug, Args)]
struct SessionArgs {
    /// JSON file describing the blocks and interval mode.
    plan: PathBuf,
    /// Output name; `.csv` is appended.
    out: PathBuf,
}

#[derive(Debug, Args)]
struct RunOptions {
    /// Seed for the random source. A random seed is drawn and logged when omitted.
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Attempts allowed per block before giving up.
    #[arg(long, global = true, default_value = "1000")]
    max_attempts: NonZeroU32,
    /// Wall-clock budget per block in milliseconds.
    #[arg(long, global = true)]
    deadline_ms: Option<u64>,
}

impl RunOptions {
    fn policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(self.max_attempts);
        match self.deadline_ms {
            Some(millis) => policy.with_deadline(Duration::from_millis(millis)),
            None => policy,
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        let seed = self.seed.unwrap_or_else(rand::random);
        tracing::info!(seed, "seeding random source");
        ChaCha8Rng::seed_from_u64(seed)
    }
}

/// Entry point for the Poisson ITI command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.mode {
        Mode::Generate(args) => run_generate(args, &cli.run),
        Mode::Session(args) => run_session(args, &cli.run),
    }
}

fn init_tracing(verbosity: u8) {
    let fallback = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_generate(args: &GenerateArgs, run: &RunOptions) -> Result<()> {
    let mut request = IntervalRequest::new(args.n, args.min, args.mean, args.max)
        .with_bin_count(args.bins)
        .with_start_delay(args.delay)
        .with_tolerance(args.tol);
    if let Some(frame) = args.tr {
        request = request.with_frame_duration(frame);
    }

    let mut rng = run.rng();
    let outcome = IntervalGenerator::new(request, run.policy())
        .generate(&mut rng)
        .context("failed to generate intervals")?;

    let path = with_suffix(&args.out, ".csv");
    write_file(&path, |out| output::write_schedule(out, &outcome.schedule))?;
    tracing::info!(path = %path.display(), attempts = outcome.attempts, "schedule written");

    if args.histogram {
        let shifted: Vec<f64> = outcome
            .schedule
            .intervals()
            .iter()
            .map(|interval| interval - request.min_interval())
            .collect();
        let rows = density::summarize(&shifted, request.bin_count() as usize, request.rate());
        let path = with_suffix(&args.out, "_hist.csv");
        write_file(&path, |out| output::write_histogram(out, &rows))?;
        tracing::info!(path = %path.display(), "histogram written");
    }
    Ok(())
}

fn run_session(args: &SessionArgs, run: &RunOptions) -> Result<()> {
    let raw = fs::read_to_string(&args.plan)
        .with_context(|| format!("failed to read plan {}", args.plan.display()))?;
    let plan: BlockPlan = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse plan {}", args.plan.display()))?;

    let mut rng = run.rng();
    let session =
        generate_session(&plan, run.policy(), &mut rng).context("failed to generate session")?;

    let path = with_suffix(&args.out, ".csv");
    write_file(&path, |out| output::write_session(out, &session))?;
    tracing::info!(
        path = %path.display(),
        blocks = session.blocks().len(),
        trials = session.trial_count(),
        "session written"
    );
    Ok(())
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write(&mut out).with_context(|| format!("failed to write {}", path.display()))?;
    out.flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}
