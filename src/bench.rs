use crate::calibrate::calibrate;
use crate::errors::FragbenchError;
use crate::extract::extract_fragments;
use crate::load::{LoadedUnit, load};
use crate::run::{TICKS_PER_SECOND, monotonic_ticks, run_once, run_timed};
use crate::synth::synthesize;
use crate::types::{FailureKind, FragmentFailure, Measurement, Reclaim, Ticks};

/// Iteration count for the empty-loop overhead measurement.
const LOOP_OVERHEAD_ITERATIONS: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Explicit iteration count; skips calibration entirely when set.
    pub iterations: Option<u64>,
    /// Calibration target in ticks.
    pub threshold_ticks: Ticks,
    /// Value-reclamation policy for real timed runs.
    pub reclaim: Reclaim,
    /// Subtract an empty-loop measurement when no `base` fragment exists.
    pub subtract_loop: bool,
    /// Tick source, injectable for deterministic tests.
    pub timer: fn() -> Ticks,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            iterations: None,
            threshold_ticks: TICKS_PER_SECOND,
            reclaim: Reclaim::Deferred,
            subtract_loop: true,
            timer: monotonic_ticks,
        }
    }
}

/// Outcome of a full benchmark run.
///
/// Pre-flight failures and measurements are mutually exclusive: if any
/// fragment fails its pre-flight check, nothing is measured. Runtime
/// failures after a clean pre-flight are per-fragment; the other
/// measurements remain valid.
#[derive(Debug, serde::Serialize)]
pub struct RunReport {
    pub measurements: Vec<Measurement>,
    pub preflight_failures: Vec<FragmentFailure>,
    pub runtime_failures: Vec<FragmentFailure>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.preflight_failures.is_empty() && self.runtime_failures.is_empty()
    }
}

/// Extract, pre-flight, calibrate and measure every fragment of a benchmark
/// document, strictly sequentially in first-seen order.
pub fn run_benchmarks(text: &str, config: &BenchConfig) -> Result<RunReport, FragbenchError> {
    let mut extraction = extract_fragments(text)?;
    let base_body = extraction.fragments.shift_remove("base");

    if extraction.fragments.is_empty() {
        return Err(FragbenchError::NoFragments);
    }

    let setup = extraction.setup;
    let baseline_ns = establish_baseline(base_body, &setup, config)?;

    // Pre-flight: every fragment must compile and survive a single
    // iteration before anything is measured, otherwise ratios would compare
    // against broken competitors.
    let mut units: Vec<LoadedUnit> = Vec::new();
    let mut preflight_failures: Vec<FragmentFailure> = Vec::new();

    for (name, body) in &extraction.fragments {
        let source = synthesize(body, &setup, false);
        match load(&source, name) {
            Err(err) => preflight_failures.push(FragmentFailure {
                fragment: name.clone(),
                kind: FailureKind::Compile,
                detail: failure_detail(err),
            }),
            Ok(unit) => match run_timed(&unit, 1, Reclaim::Deferred, config.timer) {
                Err(err) => preflight_failures.push(FragmentFailure {
                    fragment: name.clone(),
                    kind: FailureKind::Runtime,
                    detail: failure_detail(err),
                }),
                Ok(_) => units.push(unit),
            },
        }
    }

    if !preflight_failures.is_empty() {
        return Ok(RunReport {
            measurements: Vec::new(),
            preflight_failures,
            runtime_failures: Vec::new(),
        });
    }

    let mut measurements: Vec<Measurement> = Vec::new();
    let mut runtime_failures: Vec<FragmentFailure> = Vec::new();
    let mut ratio_base: Option<f64> = None;

    for unit in &units {
        let iterations = match config.iterations {
            Some(n) => n,
            None => match calibrate(unit, config.threshold_ticks, config.timer) {
                Ok(result) => result.iterations,
                Err(err) => {
                    runtime_failures.push(late_failure(&unit.name, err));
                    continue;
                }
            },
        };

        let elapsed = match run_timed(unit, iterations, config.reclaim, config.timer) {
            Ok(ticks) => ticks,
            Err(err) => {
                runtime_failures.push(late_failure(&unit.name, err));
                continue;
            }
        };

        let per_iteration_ns = elapsed as f64 / iterations as f64 - baseline_ns;
        let denom = *ratio_base.get_or_insert(per_iteration_ns);
        let ratio = if denom != 0.0 {
            per_iteration_ns / denom
        } else {
            1.0
        };

        measurements.push(Measurement {
            name: unit.name.clone(),
            iterations,
            elapsed_ticks: elapsed,
            per_iteration_ns,
            ratio,
        });
    }

    Ok(RunReport {
        measurements,
        preflight_failures,
        runtime_failures,
    })
}

/// Establish the cost baseline that gets subtracted from every fragment.
///
/// With a `base` fragment its measured per-iteration cost is used; without
/// one, an empty loop is measured unless subtraction was turned off. Any
/// failure here aborts the run before a single fragment is benchmarked.
fn establish_baseline(
    base_body: Option<Vec<String>>,
    setup: &[String],
    config: &BenchConfig,
) -> Result<f64, FragbenchError> {
    match base_body {
        Some(body) => {
            let source = synthesize(&body, setup, false);
            let unit = load(&source, "base").map_err(baseline_error)?;
            let iterations = match config.iterations {
                Some(n) => n,
                None => {
                    calibrate(&unit, config.threshold_ticks, config.timer)
                        .map_err(baseline_error)?
                        .iterations
                }
            };
            let elapsed =
                run_timed(&unit, iterations, config.reclaim, config.timer).map_err(baseline_error)?;
            Ok(elapsed as f64 / iterations as f64)
        }
        None if config.subtract_loop => {
            let body = vec!["    ()".to_string()];
            let source = synthesize(&body, &[], false);
            let unit = load(&source, "loop overhead").map_err(baseline_error)?;
            let elapsed = run_timed(&unit, LOOP_OVERHEAD_ITERATIONS, Reclaim::Deferred, config.timer)
                .map_err(baseline_error)?;
            Ok(elapsed as f64 / LOOP_OVERHEAD_ITERATIONS as f64)
        }
        None => Ok(0.0),
    }
}

fn baseline_error(err: FragbenchError) -> FragbenchError {
    FragbenchError::Baseline {
        detail: err.to_string(),
    }
}

fn late_failure(name: &str, err: FragbenchError) -> FragmentFailure {
    FragmentFailure {
        fragment: name.to_string(),
        kind: FailureKind::Runtime,
        detail: failure_detail(err),
    }
}

/// The fragment name already heads the failure line; keep only the inner
/// detail for the errors that would repeat it.
fn failure_detail(err: FragbenchError) -> String {
    match err {
        FragbenchError::Compile { line, detail, .. } => format!("`{line}`: {detail}"),
        FragbenchError::Runtime { detail, .. } => detail,
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShowOptions {
    pub source: bool,
    pub results: bool,
}

/// Inspection mode: per fragment, print the produced value (capture-mode
/// single run) and/or the synthesized timing harness source instead of
/// benchmarking. `base` is not shown.
pub fn show_fragments(text: &str, opts: &ShowOptions) -> Result<String, FragbenchError> {
    let mut extraction = extract_fragments(text)?;
    extraction.fragments.shift_remove("base");

    let setup = extraction.setup;
    let mut out = String::new();

    for (name, body) in &extraction.fragments {
        out.push_str(name);
        out.push_str(":\n");

        if opts.results {
            let source = synthesize(body, &setup, true);
            let line = match load(&source, name).and_then(|unit| run_once(&unit)) {
                Ok(value) => format!(">> Result: {:?}\n", value),
                Err(err) => format!(">> Result: {}\n", err),
            };
            out.push_str(&line);
        }

        if opts.source {
            let source = synthesize(body, &setup, false);
            out.push_str(">> Source:\n");
            out.push_str(&source);
        }
    }

    Ok(out)
}
