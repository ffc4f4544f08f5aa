//! # solver-bench
//!
//! Offline benchmark for the LU kernel alone: times the serial solve and
//! the pool-parallel solve on square systems sized by their matrix
//! footprint in MiB. Problem instances are cached in the working
//! directory as single-instance `problem_<n>.raw` files so repeated runs
//! factor the same systems.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lesched_pool::{PoolConfig, WorkerPool};
use lesched_solver::{generate_diagonally_dominant, lu, lu_parallel_task, LinearEquation};

/// Benchmark the LU solver on matrices of the given sizes.
#[derive(Parser)]
#[command(name = "solver-bench", version, about, long_about = None)]
struct Cli {
    /// Matrix footprints to benchmark, in MiB
    #[arg(value_name = "MIB", required = true)]
    sizes_mib: Vec<usize>,

    /// Worker threads for the parallel solve
    #[arg(short, long, default_value_t = default_threads())]
    threads: usize,

    /// Skip the serial baseline
    #[arg(long)]
    parallel_only: bool,
}

fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Smallest power-of-two dimension whose `n × n` doubles cover `mib`.
fn n_from_mib(mib: usize) -> usize {
    let doubles = (mib * 1024 * 1024) / std::mem::size_of::<f64>();
    let mut n = 1;
    while n * n < doubles {
        n *= 2;
    }
    n
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
    if cli.threads == 0 {
        eprintln!("solver-bench: threads must be positive");
        process::exit(1);
    }

    if let Err(err) = run(&cli) {
        eprintln!("solver-bench: {err:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    for &mib in &cli.sizes_mib {
        let n = n_from_mib(mib);
        let footprint_mib = n * n * std::mem::size_of::<f64>() / (1024 * 1024);
        println!();
        println!("Problem size {n}*{n} ({footprint_mib}MiB)");

        let instance = cached_instance(n)?;

        let serial = if cli.parallel_only {
            None
        } else {
            let started = Instant::now();
            lu::solve(instance.clone()).context("serial solve failed")?;
            let elapsed = started.elapsed().as_secs_f64();
            println!("serial       took {elapsed:.3}s");
            Some(elapsed)
        };

        let pool = Arc::new(WorkerPool::new(PoolConfig::new(cli.threads).pinned()));
        let (task, result) = lu_parallel_task(instance, Arc::clone(&pool));

        let started = Instant::now();
        pool.enqueue(Arc::clone(&task));
        WorkerPool::await_detached(&task);
        let elapsed = started.elapsed().as_secs_f64();
        pool.stop();

        result
            .take()
            .expect("awaited task left no result")
            .context("parallel solve failed")?;

        match serial {
            Some(serial) => println!(
                "parallel({:>2}) took {elapsed:.3}s (speedup {:.2}x)",
                cli.threads,
                serial / elapsed
            ),
            None => println!("parallel({:>2}) took {elapsed:.3}s", cli.threads),
        }
    }
    Ok(())
}

/// Load the cached instance for dimension `n`, generating and saving it on
/// first use.
fn cached_instance(n: usize) -> Result<LinearEquation> {
    let path = PathBuf::from(format!("problem_{n}.raw"));
    if path.exists() {
        info!(path = %path.display(), "reusing cached problem");
        return LinearEquation::load(&path)
            .with_context(|| format!("failed to read problem file {}", path.display()));
    }

    let mut rng = rand::thread_rng();
    let instance = generate_diagonally_dominant(n, &mut rng);
    instance
        .save(&path)
        .with_context(|| format!("failed to write problem file {}", path.display()))?;
    Ok(instance)
}
