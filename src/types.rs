use indexmap::IndexMap;
use serde::Serialize;

/// Elapsed time in fixed-resolution monotonic ticks (nanoseconds).
pub type Ticks = u64;

/// Output of the fragment extractor: the shared setup prelude plus the
/// fragments in first-seen order.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub setup: Vec<String>,
    pub fragments: IndexMap<String, Vec<String>>,
}

/// Value-reclamation policy for the timed loop.
///
/// `Deferred` (the default) parks every value a loop statement produces and
/// frees them only after the end timestamp, keeping drop cost out of the
/// measured interval. `Inline` drops each value where it is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaim {
    Deferred,
    Inline,
}

/// Result of a calibration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationResult {
    pub iterations: u64,
    pub observed_ticks: Ticks,
}

/// One fragment's measured timing, created after a real timed run.
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub name: String,
    pub iterations: u64,
    pub elapsed_ticks: Ticks,
    /// Per-iteration cost in nanoseconds, after baseline subtraction.
    /// Can go slightly negative when measurement noise dominates.
    pub per_iteration_ns: f64,
    /// Cost relative to the first measured fragment.
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Compile,
    Runtime,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Compile => write!(f, "compile error"),
            FailureKind::Runtime => write!(f, "runtime error"),
        }
    }
}

/// A per-fragment failure, reported instead of a timing line.
#[derive(Debug, Clone, Serialize)]
pub struct FragmentFailure {
    pub fragment: String,
    pub kind: FailureKind,
    pub detail: String,
}
