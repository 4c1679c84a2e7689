// Fri Oct 16 2026 - Alex

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use jobline::{
    config::EngineConfig,
    engine::{LinkAction, Stage, Topology, Worker},
    utils::{format_duration, logging, pluralize, LoggingUtils},
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Drive jobs through worker threads and chained stages", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON engine config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the effective engine config to this path before running
    #[arg(long, global = true)]
    save_config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, global = true)]
    no_progress: bool,

    /// Simulated work per job, in milliseconds
    #[arg(long, default_value_t = 5, global = true)]
    work_ms: u64,

    /// Give up waiting for results after this many seconds
    #[arg(long, default_value_t = 60, global = true)]
    timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Push jobs through a chain of linked stages
    Chain {
        #[arg(short, long, default_value_t = 3)]
        stages: usize,

        #[arg(short, long, default_value_t = 100)]
        jobs: u64,
    },
    /// Spread jobs round-robin over independent workers
    Workers {
        #[arg(short, long)]
        workers: Option<usize>,

        #[arg(short, long, default_value_t = 100)]
        jobs: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if use_env_logger(args.verbose, std::env::var("RUST_LOG").ok().as_deref()) {
        LoggingUtils::init_from_env();
    } else {
        let level = if args.verbose > 0 {
            LoggingUtils::level_from_verbosity(args.verbose)
        } else {
            LoggingUtils::level_from_str(&config.log_level)
        };
        LoggingUtils::init_logger(level);
    }

    if let Some(path) = &args.save_config {
        config
            .save(path)
            .with_context(|| format!("failed to save config {}", path.display()))?;
        println!("{} Saved config to {}", "[+]".green(), path.display());
    }

    println!("{}", "jobline".cyan().bold());
    println!("{}", "=".repeat(50).cyan());

    let work = Duration::from_millis(args.work_ms);
    let timeout = Duration::from_secs(args.timeout);
    let start_time = Instant::now();

    let completed = match args.command {
        Command::Chain { stages, jobs } => {
            run_chain(&config, stages, jobs, work, timeout, !args.no_progress)?
        }
        Command::Workers { workers, jobs } => {
            let workers = workers.unwrap_or_else(num_cpus::get);
            run_workers(&config, workers, jobs, work, timeout, !args.no_progress)?
        }
    };

    println!(
        "{} Completed {} in {}",
        "[+]".green(),
        pluralize(completed as usize, "job", "jobs"),
        format_duration(start_time.elapsed())
    );

    Ok(())
}

/// `-v` always wins; otherwise a non-empty `RUST_LOG` hands filtering to `env_logger`.
fn use_env_logger(verbose: u8, rust_log: Option<&str>) -> bool {
    verbose == 0 && rust_log.map_or(false, |filter| !filter.trim().is_empty())
}

fn run_chain(
    config: &EngineConfig,
    stage_count: usize,
    jobs: u64,
    work: Duration,
    timeout: Duration,
    progress: bool,
) -> anyhow::Result<u64> {
    if stage_count == 0 {
        bail!("a chain needs at least one stage");
    }

    let _timer = logging::scoped_timer("chain");
    let topology: Topology<u64> = Topology::from_config(config);
    let (tx, rx) = channel();
    let tx = Mutex::new(tx);

    let mut stages: Vec<Stage<u64>> = (0..stage_count - 1)
        .map(|i| {
            topology.stage(&format!("stage-{}", i), move |_: &u64| thread::sleep(work))
        })
        .collect();

    stages.push(topology.stage(&format!("stage-{}", stage_count - 1), move |job: &u64| {
        thread::sleep(work);
        let _ = tx.lock().send(*job);
    }));

    for pair in stages.windows(2) {
        Stage::connect(&pair[0], &pair[1], LinkAction::BOTH)?;
    }
    stages[0].start();

    println!(
        "{} Chain of {} ({} ms per job per stage)",
        "[*]".blue(),
        pluralize(stage_count, "stage", "stages"),
        work.as_millis()
    );

    for job in 0..jobs {
        stages[0].add(job);
    }

    let completed = wait_for(&rx, jobs, timeout, progress)?;

    for stage in &stages {
        stage.stop();
    }
    for stage in &stages {
        stage.join();
    }

    Ok(completed)
}

fn run_workers(
    config: &EngineConfig,
    worker_count: usize,
    jobs: u64,
    work: Duration,
    timeout: Duration,
    progress: bool,
) -> anyhow::Result<u64> {
    if worker_count == 0 {
        bail!("at least one worker is required");
    }

    let _timer = logging::scoped_timer("workers");
    let (tx, rx) = channel();

    let workers: Vec<Worker<u64>> = (0..worker_count)
        .map(|i| {
            let tx = Mutex::new(tx.clone());
            Worker::from_config(config, &format!("worker-{}", i), move |job: &u64| {
                thread::sleep(work);
                let _ = tx.lock().send(*job);
            })
        })
        .collect();
    drop(tx);

    for worker in &workers {
        worker.start();
    }

    println!(
        "{} {} polling every {} ms",
        "[*]".blue(),
        pluralize(worker_count, "worker", "workers"),
        config.poll_interval_ms
    );

    for job in 0..jobs {
        workers[(job as usize) % worker_count].add(job);
    }

    let completed = wait_for(&rx, jobs, timeout, progress)?;

    for worker in &workers {
        worker.stop();
    }
    for worker in &workers {
        worker.join();
    }

    Ok(completed)
}

fn wait_for(rx: &Receiver<u64>, jobs: u64, timeout: Duration, progress: bool) -> anyhow::Result<u64> {
    let bar = if progress {
        let pb = ProgressBar::new(jobs);
        pb.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"));
        Some(pb)
    } else {
        None
    };

    let deadline = Instant::now() + timeout;
    let mut completed = 0;

    while completed < jobs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(_) => {
                completed += 1;
                if let Some(pb) = &bar {
                    pb.inc(1);
                }
            }
            Err(_) => break,
        }
    }

    if let Some(pb) = &bar {
        pb.finish_with_message("done");
    }

    if completed < jobs {
        eprintln!(
            "{} Only {}/{} jobs finished before the timeout",
            "[!]".red(),
            completed,
            jobs
        );
    }

    Ok(completed)
}
