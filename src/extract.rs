use indexmap::IndexMap;

use crate::errors::FragbenchError;
use crate::types::Extraction;

/// Where body lines are currently routed.
enum Cursor {
    /// No fragment open; lines belong to the shared setup prelude.
    Setup,
    /// A named fragment is open.
    Fragment(String),
    /// A private `_name` block is open; its lines fold into setup.
    Private,
}

/// Split a benchmark document into a setup prelude and an ordered mapping of
/// fragment name to body lines.
///
/// A top-level line starting with `fn ` opens a fragment. While one is open,
/// blank or indented lines belong to its body; the first non-blank,
/// non-indented line closes it and joins the setup. Headers whose name starts
/// with `_` mark private helper blocks: the header is carried into setup as a
/// comment and the body lines become plain setup statements. Duplicate names
/// keep their first-seen position; the last definition wins.
pub fn extract_fragments(text: &str) -> Result<Extraction, FragbenchError> {
    let mut setup: Vec<String> = Vec::new();
    let mut fragments: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut cursor = Cursor::Setup;

    for (idx, line) in text.lines().enumerate() {
        if let Some(rest) = line.strip_prefix("fn ") {
            let name = parse_header_name(rest).ok_or_else(|| {
                FragbenchError::MalformedHeader {
                    line_no: idx + 1,
                    line: line.to_string(),
                }
            })?;

            if name.starts_with('_') {
                setup.push(format!("# {}", line));
                cursor = Cursor::Private;
            } else {
                fragments.insert(name.to_string(), Vec::new());
                cursor = Cursor::Fragment(name.to_string());
            }
            continue;
        }

        let body_line = line.trim().is_empty() || line.starts_with([' ', '\t']);

        match cursor {
            Cursor::Setup => setup.push(line.to_string()),
            Cursor::Fragment(ref name) if body_line => {
                // Entry is guaranteed present; the header inserted it.
                if let Some(body) = fragments.get_mut(name) {
                    body.push(line.to_string());
                }
            }
            Cursor::Private if body_line => setup.push(line.to_string()),
            _ => {
                cursor = Cursor::Setup;
                setup.push(line.to_string());
            }
        }
    }

    if fragments.is_empty() {
        return Err(FragbenchError::NoFragments);
    }

    Ok(Extraction { setup, fragments })
}

/// Extract the fragment name from the text after `fn `, accepting an
/// optional parameter list: `name`, `name()`, `name ()`.
fn parse_header_name(rest: &str) -> Option<&str> {
    let name = rest
        .split(['(', ' ', '\t'])
        .next()
        .unwrap_or("")
        .trim_end();

    if name.is_empty() {
        return None;
    }

    let mut chars = name.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    Some(name)
}
