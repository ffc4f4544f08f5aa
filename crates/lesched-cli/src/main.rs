//! # lesched
//!
//! Benchmark front-end: generates (or reuses) a problem series, replays it
//! through the selected scheduling policy and reports wall time,
//! efficiency and per-worker utilization.
//!
//! ```text
//! lesched <scheduler> <num_threads> <load_factor> <min_n> <max_n> <score>
//! ```

use std::process;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lesched_online::{build_policy, PolicyKind, ProblemQueue, Scheduler, SeriesProducer};
use lesched_pool::{PoolConfig, WorkerPool};
use lesched_solver::{cache_path, LinearEquationSeries};

/// Online scheduling benchmark for linear equation solving.
#[derive(Parser)]
#[command(name = "lesched", version, about, long_about = None)]
struct Cli {
    /// Scheduling policy: verification_a, verification_b, trivial,
    /// parallel, mixed or size_mixed
    scheduler: String,

    /// Pool worker count (ignored by the verification schedulers)
    num_threads: usize,

    /// Arrival-rate multiplier relative to serial-runtime pacing
    load_factor: f64,

    /// Smallest generated problem dimension
    min_n: usize,

    /// Largest generated problem dimension
    max_n: usize,

    /// Minimum total reference score of the series, in seconds
    score: f64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            use clap::error::ErrorKind;
            let requested = matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            );
            let _ = err.print();
            process::exit(if requested { 0 } else { 1 });
        }
    };

    let kind = match cli.scheduler.parse::<PolicyKind>() {
        Ok(kind) => kind,
        Err(err) => usage_error(&err.to_string()),
    };
    if !kind.is_verification() && cli.num_threads == 0 {
        usage_error("num_threads must be positive");
    }
    if !(cli.load_factor > 0.0) {
        usage_error("load_factor must be positive");
    }
    if cli.min_n < 1 || cli.min_n > cli.max_n {
        usage_error("expected 1 <= min_n <= max_n");
    }
    if !(cli.score > 0.0) {
        usage_error("score must be positive");
    }

    if let Err(err) = run(&cli, kind) {
        eprintln!("lesched: {err:#}");
        process::exit(1);
    }
}

fn usage_error(message: &str) -> ! {
    eprintln!("lesched: {message}");
    eprintln!("usage: lesched <scheduler> <num_threads> <load_factor> <min_n> <max_n> <score>");
    process::exit(1);
}

fn run(cli: &Cli, kind: PolicyKind) -> Result<()> {
    let series = load_or_generate_series(cli)?;
    let total_score = series.total_score();

    // Verification solves inline on the dispatch thread; no workers.
    let num_threads = if kind.is_verification() {
        0
    } else {
        cli.num_threads
    };
    let trace_suffix = format!(
        "{}_{}_{}_{}_{}_{}",
        kind.name(),
        cli.num_threads,
        cli.load_factor,
        cli.min_n,
        cli.max_n,
        cli.score
    );
    let pool = Arc::new(WorkerPool::new(
        PoolConfig::new(num_threads)
            .pinned()
            .with_trace_suffix(trace_suffix),
    ));
    let (policy, verification) = build_policy(kind, &pool);

    let queue = Arc::new(ProblemQueue::new());
    let producer = SeriesProducer::spawn(series, cli.load_factor, Arc::clone(&queue));

    let started = Instant::now();
    let scheduler = Scheduler::start(Arc::clone(&queue), Arc::clone(&pool), policy);

    producer.join();
    scheduler.stop();
    let duration = started.elapsed().as_secs_f64();

    println!("Took {duration:.3} seconds. Total score {total_score:.3} seconds.");
    if num_threads > 0 {
        let efficiency = 100.0 * (total_score / num_threads as f64) / duration;
        println!("Efficiency: {efficiency:.1}%");
        for (tid, stats) in pool.worker_stats().iter().enumerate() {
            println!(
                "[Worker {tid}] [waiting:{:.3}s][running:{:.3}s]",
                stats.waiting_s(),
                stats.running_s
            );
        }
    }
    if let Some(stats) = verification {
        println!("Verification success rate: {:.1}%", stats.success_percent());
    }
    Ok(())
}

fn load_or_generate_series(cli: &Cli) -> Result<LinearEquationSeries> {
    let path = cache_path(cli.min_n, cli.max_n, cli.score);
    if path.exists() {
        info!(path = %path.display(), "reusing cached series");
        return LinearEquationSeries::load(&path)
            .with_context(|| format!("failed to read series file {}", path.display()));
    }

    info!(
        min_n = cli.min_n,
        max_n = cli.max_n,
        score = cli.score,
        "generating problem series (scores are measured serial solves; this takes a while)"
    );
    let series = LinearEquationSeries::generate(cli.min_n, cli.max_n, cli.score);
    series
        .save(&path)
        .with_context(|| format!("failed to write series file {}", path.display()))?;
    Ok(series)
}
