//! qstorm: standalone load-test entry point.
//!
//! Drives the harness against the bundled cached-SQLite demonstration
//! service (or a workload file of your own) and prints per-worker
//! totals, captured exceptions, and cache-efficiency figures.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use qstorm_core::{CacheStatsReporter, RunController, WorkloadCorpus};
use qstorm_types::{RunConfig, RunReport, SelectionPlan, SelectionPolicy};
use tracing_subscriber::EnvFilter;

mod service;

use service::CachedSqliteService;

/// Per-worker iteration budget when no time limit is given.
const DEFAULT_ITERATIONS: u64 = 1_000;
/// Root seed for random selection; worker `i` derives `seed + i`.
const DEFAULT_SEED: u64 = 0x5117_0C75;

#[derive(Debug, PartialEq, Eq)]
struct CliConfig {
    workers: usize,
    duration_secs: u64,
    random: bool,
    workload_path: Option<PathBuf>,
}

fn print_usage() {
    let usage = "\
qstorm: concurrent correctness-and-load harness for a cached query service

USAGE:
    qstorm <WORKERS> <DURATION_SECS> <RANDOM> [WORKLOAD_FILE]

ARGS:
    <WORKERS>         Number of virtual users (positive integer)
    <DURATION_SECS>   Run duration in seconds; 0 disables the time limit
                      and runs a fixed iteration budget per worker instead
    <RANDOM>          true = random query selection, false = sequential
    [WORKLOAD_FILE]   Optional workload JSON (array of items, or object
                      with named groups); the built-in demonstration
                      workload is used when omitted

ENVIRONMENT:
    QSTORM_REPORT_JSON   Write the full run report as JSON to this path
    RUST_LOG             tracing filter (e.g. qstorm=debug)
";
    eprintln!("{usage}");
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    if args.len() < 3 || args.len() > 4 {
        return Err(format!(
            "expected 3 positional arguments (plus optional workload file), got {}",
            args.len()
        ));
    }

    let workers: usize = args[0]
        .parse()
        .map_err(|_| format!("worker count must be a positive integer, got '{}'", args[0]))?;
    if workers == 0 {
        return Err("worker count must be a positive integer, got '0'".to_owned());
    }

    let duration_secs: u64 = args[1].parse().map_err(|_| {
        format!(
            "run duration must be a non-negative integer of seconds, got '{}'",
            args[1]
        )
    })?;

    let random = parse_bool(&args[2])
        .ok_or_else(|| format!("selection flag must be true or false, got '{}'", args[2]))?;

    Ok(CliConfig {
        workers,
        duration_secs,
        random,
        workload_path: args.get(3).map(PathBuf::from),
    })
}

fn load_corpus(cli: &CliConfig) -> Result<WorkloadCorpus, String> {
    match &cli.workload_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| format!("workload_read_failed path={} error={err}", path.display()))?;
            WorkloadCorpus::from_json(&text)
                .map_err(|err| format!("workload_load_failed path={} error={err}", path.display()))
        }
        None => WorkloadCorpus::from_items(CachedSqliteService::demo_workload())
            .map_err(|err| format!("builtin_workload_failed: {err}")),
    }
}

fn run_config_for(cli: &CliConfig) -> RunConfig {
    let policy = if cli.random {
        SelectionPolicy::Random
    } else {
        SelectionPolicy::Sequential
    };
    let iteration_limit = if cli.duration_secs == 0 {
        DEFAULT_ITERATIONS
    } else {
        0
    };
    RunConfig {
        worker_count: cli.workers,
        iteration_limit,
        time_limit_millis: cli.duration_secs * 1_000,
        selection: SelectionPlan::Flat(policy),
        stop_on_first_failure: false,
        seed: DEFAULT_SEED,
    }
}

fn print_report(report: &RunReport) {
    for summary in &report.per_worker {
        println!(
            "worker {}: ran {} queries, {} succeeded, {} ms",
            summary.worker_id, summary.executed, summary.succeeded, summary.elapsed_millis
        );
    }
    if !report.errors.is_empty() {
        println!("exceptions:");
        for outcome in &report.errors {
            let detail = outcome
                .error
                .as_ref()
                .map_or_else(|| "unknown failure".to_owned(), ToString::to_string);
            println!(
                "  worker {} item {}: {detail}",
                outcome.worker_id, outcome.item_index
            );
        }
    }
    println!("{}", report.summary_line());
}

fn write_json_artifact(report: &RunReport) -> Result<(), String> {
    let Ok(path) = env::var("QSTORM_REPORT_JSON") else {
        return Ok(());
    };
    let payload = serde_json::to_vec_pretty(report)
        .map_err(|err| format!("report_serialize_failed: {err}"))?;
    std::fs::write(&path, payload).map_err(|err| format!("report_write_failed path={path} error={err}"))
}

fn run(args: &[String]) -> Result<bool, String> {
    let cli = parse_args(args)?;
    let corpus = load_corpus(&cli)?;
    let config = run_config_for(&cli);

    let service = CachedSqliteService::open_demo()?;
    let mut cache_reporter = CacheStatsReporter::new(&service);
    cache_reporter.before();

    let report =
        RunController::execute(&corpus, &service, &config).map_err(|err| err.to_string())?;

    cache_reporter.after();
    print_report(&report);
    println!("{}", cache_reporter.report());
    write_json_artifact(&report)?;

    Ok(report.passed())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(error) => {
            eprintln!("ERROR: {error}");
            print_usage();
            ExitCode::from(2)
        }
    }
}
