/// Marker line separating one-time init from the measured body inside a
/// fragment.
pub const INIT_MARKER: &str = "###";

/// Section marker lines in synthesized harness source.
pub const SETUP_SECTION: &str = "# setup";
pub const INIT_SECTION: &str = "# init";
pub const LOOP_SECTION: &str = "# loop";

/// Render the timing harness source for one fragment: three sections in a
/// fixed order so that setup and init cost never land inside the measured
/// interval.
///
/// The body is split at the first `###` marker line: everything before it
/// becomes the init section (run once), everything after the loop section
/// (run once per iteration). Without a marker the whole body is loop.
///
/// Timing mode (`capture == false`) rewrites a `return <expr>` loop line to
/// bare `<expr>` so the value is computed and discarded instead of ending the
/// loop early; lines after it are unreachable and are not emitted. Capture
/// mode keeps return lines and appends a trailing `return ()`, used to run
/// the fragment exactly once and hand back its value.
///
/// Comment lines are dropped from every section: the loader would skip them
/// anyway, and a user comment that reads like a marker line must never open
/// a section.
pub fn synthesize(body: &[String], setup: &[String], capture: bool) -> String {
    let marker = body.iter().position(|line| line.trim() == INIT_MARKER);
    let (init, loop_body) = match marker {
        Some(idx) => (&body[..idx], &body[idx + 1..]),
        None => (&body[..0], body),
    };

    let mut out = String::new();

    out.push_str(SETUP_SECTION);
    out.push('\n');
    for line in setup {
        if is_comment(line) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.push_str(INIT_SECTION);
    out.push('\n');
    for line in init {
        if is_comment(line) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.push_str(LOOP_SECTION);
    out.push('\n');
    if capture {
        for line in loop_body {
            if is_comment(line) {
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("return ()\n");
    } else {
        for line in loop_body {
            if is_comment(line) {
                continue;
            }
            let trimmed = line.trim();
            if trimmed == "return" {
                break;
            }
            if let Some(expr) = trimmed.strip_prefix("return ") {
                out.push_str(expr.trim_start());
                out.push('\n');
                break;
            }
            out.push_str(line);
            out.push('\n');
        }
    }

    out
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}
