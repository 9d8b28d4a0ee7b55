use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum FragbenchError {
    #[error("Failed to read benchmark file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No benchmark fragments found (expected at least one top-level `fn name()` block)")]
    NoFragments,

    #[error("Malformed fragment header on line {line_no}: {line}")]
    MalformedHeader { line_no: usize, line: String },

    #[error("Harness for '{fragment}' is missing its '{section}' section")]
    MalformedHarness {
        fragment: String,
        section: &'static str,
    },

    #[error("Fragment '{fragment}' failed to compile at `{line}`: {detail}")]
    Compile {
        fragment: String,
        line: String,
        detail: String,
    },

    #[error("Fragment '{fragment}' failed at runtime: {detail}")]
    Runtime { fragment: String, detail: String },

    #[error("Baseline measurement failed: {detail}")]
    Baseline { detail: String },
}
