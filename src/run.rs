use std::sync::OnceLock;
use std::time::Instant;

use evalexpr::{HashMapContext, Value};

use crate::errors::FragbenchError;
use crate::load::{LoadedUnit, Stmt};
use crate::types::{Reclaim, Ticks};

pub const TICKS_PER_SECOND: u64 = 1_000_000_000;

/// Monotonic nanosecond ticks against a process-local epoch. Never the wall
/// clock, so system clock adjustments cannot distort an interval.
pub fn monotonic_ticks() -> Ticks {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Upper bound on values parked in a deferred bin. A calibrated run can reach
/// tens of millions of iterations; memory must not scale with that count.
const DEFERRED_HELD_CAP: usize = 1 << 20;

/// Holds values produced inside the timed loop until after the end
/// timestamp when the policy is `Deferred`. The bin is owned by the
/// executor, so its contents are reclaimed on every exit path, including
/// mid-loop evaluation errors.
///
/// All capacity is reserved at construction, before the start timestamp, so
/// no reallocation ever lands inside the measured interval. Values beyond
/// the capacity drop inline.
struct DropBin {
    mode: Reclaim,
    held: Vec<Value>,
}

impl DropBin {
    fn new(mode: Reclaim, expected: usize) -> Self {
        let capacity = match mode {
            Reclaim::Inline => 0,
            Reclaim::Deferred => expected.min(DEFERRED_HELD_CAP),
        };
        DropBin {
            mode,
            held: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    fn dispose(&mut self, value: Value) {
        match self.mode {
            Reclaim::Inline => drop(value),
            Reclaim::Deferred => {
                if self.held.len() < self.held.capacity() {
                    self.held.push(value);
                } else {
                    drop(value);
                }
            }
        }
    }

    fn release(&mut self) {
        self.held.clear();
    }
}

fn eval_section(
    stmts: &[Stmt],
    ctx: &mut HashMapContext,
    fragment: &str,
) -> Result<(), FragbenchError> {
    for stmt in stmts {
        stmt.node
            .eval_with_context_mut(ctx)
            .map_err(|e| FragbenchError::Runtime {
                fragment: fragment.to_string(),
                detail: e.to_string(),
            })?;
    }
    Ok(())
}

/// Run a loaded unit for `iterations` loop passes in a fresh context and
/// return the elapsed ticks of the loop alone.
pub fn run_timed(
    unit: &LoadedUnit,
    iterations: u64,
    reclaim: Reclaim,
    timer: fn() -> Ticks,
) -> Result<Ticks, FragbenchError> {
    let mut ctx = HashMapContext::new();
    run_timed_with(unit, iterations, reclaim, timer, &mut ctx)
}

/// Like [`run_timed`] but evaluating into a caller-supplied context, so the
/// final variable state can be inspected afterwards.
///
/// Setup and init run once before the start timestamp; the timestamps
/// bracket exactly the loop. A return statement inside the body (only
/// possible if the harness was synthesized in capture mode) ends that
/// iteration early, like the timing-mode rewrite would.
pub fn run_timed_with(
    unit: &LoadedUnit,
    iterations: u64,
    reclaim: Reclaim,
    timer: fn() -> Ticks,
    ctx: &mut HashMapContext,
) -> Result<Ticks, FragbenchError> {
    eval_section(&unit.setup, ctx, &unit.name)?;
    eval_section(&unit.init, ctx, &unit.name)?;

    let expected = usize::try_from(iterations)
        .unwrap_or(usize::MAX)
        .saturating_mul(unit.body.len());
    let mut bin = DropBin::new(reclaim, expected);

    let t0 = timer();
    for _ in 0..iterations {
        for stmt in &unit.body {
            let value =
                stmt.node
                    .eval_with_context_mut(ctx)
                    .map_err(|e| FragbenchError::Runtime {
                        fragment: unit.name.clone(),
                        detail: e.to_string(),
                    })?;
            bin.dispose(value);
            if stmt.returns {
                break;
            }
        }
    }
    let t1 = timer();

    // Deferred values are reclaimed here, outside the measured interval.
    bin.release();

    Ok(t1.saturating_sub(t0))
}

/// Run setup, init and the body exactly once and return the value produced
/// by the first return statement (capture contract).
pub fn run_once(unit: &LoadedUnit) -> Result<Value, FragbenchError> {
    let mut ctx = HashMapContext::new();
    eval_section(&unit.setup, &mut ctx, &unit.name)?;
    eval_section(&unit.init, &mut ctx, &unit.name)?;

    for stmt in &unit.body {
        let value = stmt
            .node
            .eval_with_context_mut(&mut ctx)
            .map_err(|e| FragbenchError::Runtime {
                fragment: unit.name.clone(),
                detail: e.to_string(),
            })?;
        if stmt.returns {
            return Ok(value);
        }
    }

    Ok(Value::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::load;
    use crate::synth::synthesize;
    use evalexpr::Context;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn lines(src: &[&str]) -> Vec<String> {
        src.iter().map(|s| s.to_string()).collect()
    }

    fn unit(body: &[&str], setup: &[&str], capture: bool) -> LoadedUnit {
        let src = synthesize(&lines(body), &lines(setup), capture);
        load(&src, "test_fragment").unwrap()
    }

    #[test]
    fn loop_body_runs_exactly_iterations_times() {
        let u = unit(&["    n = n + 1"], &["n = 0"], false);
        let mut ctx = HashMapContext::new();
        run_timed_with(&u, 137, Reclaim::Deferred, monotonic_ticks, &mut ctx).unwrap();
        assert_eq!(ctx.get_value("n"), Some(&Value::Int(137)));
    }

    #[test]
    fn init_runs_once_regardless_of_iterations() {
        let u = unit(
            &["    inits = inits + 1", "    ###", "    n = n + 1"],
            &["inits = 0", "n = 0"],
            false,
        );
        let mut ctx = HashMapContext::new();
        run_timed_with(&u, 50, Reclaim::Deferred, monotonic_ticks, &mut ctx).unwrap();
        assert_eq!(ctx.get_value("inits"), Some(&Value::Int(1)));
        assert_eq!(ctx.get_value("n"), Some(&Value::Int(50)));
    }

    #[test]
    fn zero_iterations_runs_setup_and_init_only() {
        let u = unit(
            &["    inits = 1", "    ###", "    n = n + 1"],
            &["n = 0"],
            false,
        );
        let mut ctx = HashMapContext::new();
        run_timed_with(&u, 0, Reclaim::Deferred, monotonic_ticks, &mut ctx).unwrap();
        assert_eq!(ctx.get_value("inits"), Some(&Value::Int(1)));
        assert_eq!(ctx.get_value("n"), Some(&Value::Int(0)));
    }

    #[test]
    fn timing_mode_return_does_not_exit_loop() {
        // `return n` rewritten by timing-mode synthesis; the counter proves
        // every iteration still happens.
        let u = unit(
            &["    n = n + 1", "    return n"],
            &["n = 0"],
            false,
        );
        let mut ctx = HashMapContext::new();
        run_timed_with(&u, 25, Reclaim::Deferred, monotonic_ticks, &mut ctx).unwrap();
        assert_eq!(ctx.get_value("n"), Some(&Value::Int(25)));
    }

    #[test]
    fn capture_mode_returns_value_once() {
        let u = unit(&["    return 1"], &[], true);
        assert_eq!(run_once(&u).unwrap(), Value::Int(1));
    }

    #[test]
    fn capture_mode_without_explicit_return_yields_empty() {
        let u = unit(&["    x = 41"], &[], true);
        assert_eq!(run_once(&u).unwrap(), Value::Empty);
    }

    #[test]
    fn capture_mode_return_stops_early() {
        let u = unit(&["    return 7", "    x = oops_undefined"], &[], true);
        assert_eq!(run_once(&u).unwrap(), Value::Int(7));
    }

    #[test]
    fn elapsed_comes_from_bracketing_timer_calls() {
        fn stepping() -> Ticks {
            static T: AtomicU64 = AtomicU64::new(0);
            T.fetch_add(500, Ordering::Relaxed)
        }
        let u = unit(&["    1 + 1"], &[], false);
        // Timer is called exactly twice, immediately around the loop.
        let elapsed = run_timed(&u, 10, Reclaim::Deferred, stepping).unwrap();
        assert_eq!(elapsed, 500);
    }

    #[test]
    fn setup_comment_resembling_a_marker_does_not_reroute_setup() {
        // `# loop` in the setup prelude must stay a comment; `n = 0` after it
        // runs once, not once per iteration.
        let u = unit(&["    n = n + 1"], &["# loop", "n = 0"], false);
        let mut ctx = HashMapContext::new();
        run_timed_with(&u, 10, Reclaim::Deferred, monotonic_ticks, &mut ctx).unwrap();
        assert_eq!(ctx.get_value("n"), Some(&Value::Int(10)));
    }

    #[test]
    fn deferred_bin_capacity_is_reserved_up_front() {
        let bin = DropBin::new(Reclaim::Deferred, 64);
        assert!(bin.held.capacity() >= 64);
    }

    #[test]
    fn deferred_bin_never_grows_past_its_capacity() {
        let mut bin = DropBin::new(Reclaim::Deferred, 4);
        let cap = bin.held.capacity();
        for i in 0..100 {
            bin.dispose(Value::Int(i));
        }
        // Overflow values dropped inline, no reallocation.
        assert_eq!(bin.held.capacity(), cap);
        assert_eq!(bin.held.len(), cap);
    }

    #[test]
    fn inline_bin_holds_nothing() {
        let mut bin = DropBin::new(Reclaim::Inline, 64);
        bin.dispose(Value::Int(1));
        assert!(bin.held.is_empty());
        assert_eq!(bin.held.capacity(), 0);
    }

    #[test]
    fn inline_and_deferred_produce_same_results() {
        let u = unit(&["    n = n + 2"], &["n = 0"], false);
        let mut a = HashMapContext::new();
        let mut b = HashMapContext::new();
        run_timed_with(&u, 10, Reclaim::Inline, monotonic_ticks, &mut a).unwrap();
        run_timed_with(&u, 10, Reclaim::Deferred, monotonic_ticks, &mut b).unwrap();
        assert_eq!(a.get_value("n"), b.get_value("n"));
        assert_eq!(a.get_value("n"), Some(&Value::Int(20)));
    }

    #[test]
    fn runtime_error_carries_fragment_name() {
        let u = unit(&["    return not_defined_anywhere"], &[], false);
        let err = run_timed(&u, 1, Reclaim::Deferred, monotonic_ticks).unwrap_err();
        match err {
            FragbenchError::Runtime { fragment, .. } => {
                assert_eq!(fragment, "test_fragment");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn setup_error_surfaces_before_timing() {
        let u = unit(&["    1"], &["broken = also_missing"], false);
        assert!(run_timed(&u, 1, Reclaim::Deferred, monotonic_ticks).is_err());
    }

    #[test]
    fn error_mid_loop_with_deferred_bin_does_not_panic() {
        // The first statement parks a value in the bin, the second fails;
        // the bin is dropped with its contents on the error path.
        let u = unit(&["    n = n + 1", "    n + \"x\""], &["n = 0"], false);
        let err = run_timed(&u, 5, Reclaim::Deferred, monotonic_ticks);
        assert!(err.is_err());
    }

    #[test]
    fn monotonic_ticks_is_monotonic() {
        let a = monotonic_ticks();
        let b = monotonic_ticks();
        assert!(b >= a);
    }
}
