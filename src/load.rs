use evalexpr::{Node, build_operator_tree};

use crate::errors::FragbenchError;
use crate::synth::{INIT_SECTION, LOOP_SECTION, SETUP_SECTION};

/// One compiled statement of a harness section.
#[derive(Debug)]
pub(crate) struct Stmt {
    pub(crate) node: Node,
    /// True for `return <expr>` lines: capture runs yield the value and
    /// stop, timed runs discard it and move to the next iteration.
    pub(crate) returns: bool,
}

/// A harness compiled into invokable form: three sections of precompiled
/// statements, tagged with the fragment name for error attribution.
#[derive(Debug)]
pub struct LoadedUnit {
    pub name: String,
    pub(crate) setup: Vec<Stmt>,
    pub(crate) init: Vec<Stmt>,
    pub(crate) body: Vec<Stmt>,
}

/// Compile synthesized harness source into a `LoadedUnit`.
///
/// The source must contain the `# setup`, `# init` and `# loop` marker lines
/// in that order; a missing marker means the template itself is malformed and
/// is fatal for this fragment. Blank lines and `#` comments are skipped;
/// every other line is compiled as a single evalexpr statement.
pub fn load(source: &str, name: &str) -> Result<LoadedUnit, FragbenchError> {
    let mut sections: [Vec<Stmt>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    let mut current: Option<usize> = None;

    for line in source.lines() {
        match line {
            SETUP_SECTION => {
                current = Some(0);
                continue;
            }
            INIT_SECTION => {
                current = Some(1);
                continue;
            }
            LOOP_SECTION => {
                current = Some(2);
                continue;
            }
            _ => {}
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some(section) = current else {
            // Statement text before the first marker: the template is broken.
            return Err(FragbenchError::MalformedHarness {
                fragment: name.to_string(),
                section: SETUP_SECTION,
            });
        };

        let (expr, returns) = match trimmed.strip_prefix("return") {
            Some(rest) if rest.is_empty() => ("()", true),
            Some(rest) if rest.starts_with([' ', '\t']) => (rest.trim(), true),
            _ => (trimmed, false),
        };

        let node = build_operator_tree(expr).map_err(|e| FragbenchError::Compile {
            fragment: name.to_string(),
            line: trimmed.to_string(),
            detail: e.to_string(),
        })?;

        sections[section].push(Stmt { node, returns });
    }

    if current != Some(2) {
        let missing = match current {
            None => SETUP_SECTION,
            Some(0) => INIT_SECTION,
            _ => LOOP_SECTION,
        };
        return Err(FragbenchError::MalformedHarness {
            fragment: name.to_string(),
            section: missing,
        });
    }

    let [setup, init, body] = sections;
    Ok(LoadedUnit {
        name: name.to_string(),
        setup,
        init,
        body,
    })
}
