use crate::errors::FragbenchError;
use crate::load::LoadedUnit;
use crate::run::run_timed;
use crate::types::{CalibrationResult, Reclaim, Ticks};

/// Fixed sample size for the calibration run.
pub const SAMPLE_ITERATIONS: u64 = 1_000;

/// Single-shot linear estimate of the iteration count needed to reach
/// `threshold` ticks, from one observation of `sample` iterations. No
/// refinement pass: fragments with strong first-call effects can be over- or
/// under-estimated, which is accepted.
pub fn extrapolate(threshold: Ticks, observed: Ticks, sample: u64) -> u64 {
    let observed = observed.max(1);
    let estimate = threshold as f64 / observed as f64 * sample as f64;
    (estimate as u64).max(1)
}

/// Run the unit once at the fixed sample count and extrapolate how many
/// iterations a real run needs to approach `threshold`.
pub fn calibrate(
    unit: &LoadedUnit,
    threshold: Ticks,
    timer: fn() -> Ticks,
) -> Result<CalibrationResult, FragbenchError> {
    let observed = run_timed(unit, SAMPLE_ITERATIONS, Reclaim::Deferred, timer)?;
    Ok(CalibrationResult {
        iterations: extrapolate(threshold, observed, SAMPLE_ITERATIONS),
        observed_ticks: observed,
    })
}
