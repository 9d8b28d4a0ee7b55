use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;

use fragbench::bench::{self, BenchConfig, ShowOptions};
use fragbench::display;
use fragbench::errors::FragbenchError;
use fragbench::run::TICKS_PER_SECOND;
use fragbench::types::Reclaim;

#[derive(Parser)]
#[command(
    name = "fragbench",
    version,
    about = "Measure and compare named code fragments from a benchmark file"
)]
struct Cli {
    /// Benchmark source file
    path: PathBuf,

    /// Fixed iteration count (skips calibration)
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Target time per benchmark in seconds
    #[arg(short, long, default_value_t = 1.0)]
    threshold: f64,

    /// Reclaim fragment values inline during the timed loop
    #[arg(short = 'g', long)]
    reclaim: bool,

    /// Keep loop overhead in reported timings
    #[arg(short = 'l', long)]
    keep_loop: bool,

    /// Print synthesized harness source instead of benchmarking
    #[arg(short = 's', long)]
    show_source: bool,

    /// Print each fragment's produced value instead of benchmarking
    #[arg(short = 'r', long)]
    show_results: bool,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let text = std::fs::read_to_string(&cli.path).map_err(|source| FragbenchError::ReadError {
        path: cli.path.clone(),
        source,
    })?;

    if cli.show_source || cli.show_results {
        let opts = ShowOptions {
            source: cli.show_source,
            results: cli.show_results,
        };
        print!("{}", bench::show_fragments(&text, &opts)?);
        return Ok(0);
    }

    let threshold_ticks = if cli.threshold > 0.0 {
        (cli.threshold * TICKS_PER_SECOND as f64) as u64
    } else {
        TICKS_PER_SECOND
    };

    let config = BenchConfig {
        iterations: cli.iterations.filter(|&n| n > 0),
        threshold_ticks,
        reclaim: if cli.reclaim {
            Reclaim::Inline
        } else {
            Reclaim::Deferred
        },
        subtract_loop: !cli.keep_loop,
        ..BenchConfig::default()
    };

    let report = bench::run_benchmarks(&text, &config)?;

    let output = if cli.json {
        display::format_json(&report)
    } else {
        display::format_report(&report)
    };
    print!("{}", output);

    Ok(if report.is_clean() { 0 } else { 1 })
}

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}
