pub mod bench;
pub mod calibrate;
pub mod display;
pub mod errors;
pub mod extract;
pub mod load;
pub mod run;
pub mod synth;
pub mod types;

#[cfg(test)]
mod pipeline_smoke_tests {
    // Cross-module check: anything the synthesizer emits must load, and the
    // loaded unit must survive a single iteration, for representative
    // fragment shapes.

    use crate::load::load;
    use crate::run::{monotonic_ticks, run_timed};
    use crate::synth::synthesize;
    use crate::types::Reclaim;

    const SHAPES: &[&[&str]] = &[
        &["    return 1"],
        &["    x = 1", "    return x + 1"],
        &["    init = 0", "    ###", "    init + 1"],
        &[],
        &["    return"],
    ];

    #[test]
    fn every_synthesized_shape_loads_and_runs() {
        let setup = vec!["shared = 2".to_string()];
        for shape in SHAPES {
            let body: Vec<String> = shape.iter().map(|s| s.to_string()).collect();
            let source = synthesize(&body, &setup, false);
            let unit = load(&source, "shape").unwrap_or_else(|e| {
                panic!("shape {shape:?} failed to load: {e}");
            });
            run_timed(&unit, 1, Reclaim::Deferred, monotonic_ticks).unwrap_or_else(|e| {
                panic!("shape {shape:?} failed to run: {e}");
            });
        }
    }
}
