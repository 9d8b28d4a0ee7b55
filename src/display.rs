use owo_colors::{OwoColorize, Stream};

use crate::bench::RunReport;
use crate::types::{FragmentFailure, Measurement};

/// Aligned timing lines: name, per-iteration cost in nanoseconds, ratio
/// against the first measured fragment.
pub fn format_report(report: &RunReport) -> String {
    if !report.preflight_failures.is_empty() {
        return format_failures(&report.preflight_failures);
    }

    let mut out = String::new();

    let name_width = report
        .measurements
        .iter()
        .map(|m| m.name.len())
        .chain(report.runtime_failures.iter().map(|f| f.fragment.len()))
        .max()
        .unwrap_or(0);

    for m in &report.measurements {
        out.push_str(&format_measurement(m, name_width));
    }

    if !report.runtime_failures.is_empty() {
        out.push_str(&format_failures(&report.runtime_failures));
    }

    out
}

fn format_measurement(m: &Measurement, name_width: usize) -> String {
    let name_padded = format!("{:<width$}", m.name, width = name_width);
    let name_colored = name_padded
        .if_supports_color(Stream::Stdout, |s| s.green())
        .to_string();

    let cost = format!("{:>12.2}ns", m.per_iteration_ns);
    let cost_colored = cost
        .if_supports_color(Stream::Stdout, |s| s.yellow())
        .to_string();

    let ratio = format!("{:>6.2}", m.ratio);
    let ratio_colored = ratio
        .if_supports_color(Stream::Stdout, |s| s.dimmed())
        .to_string();

    format!("{}  {}  {}\n", name_colored, cost_colored, ratio_colored)
}

/// One line per failed fragment: name, error category, message.
pub fn format_failures(failures: &[FragmentFailure]) -> String {
    let mut out = String::new();
    for f in failures {
        let name_colored = f
            .fragment
            .if_supports_color(Stream::Stdout, |s| s.green())
            .to_string();
        let kind_colored = f
            .kind
            .to_string()
            .if_supports_color(Stream::Stdout, |s| s.red())
            .to_string();
        out.push_str(&format!("{}: {}: {}\n", name_colored, kind_colored, f.detail));
    }
    out
}

/// The whole report as pretty-printed JSON.
pub fn format_json(report: &RunReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}
