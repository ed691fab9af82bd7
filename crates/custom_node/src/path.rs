//! Dotted path lookup inside a JSON document.
//!
//! `a.b.0` walks object keys and array indexes, `\` escapes the next
//! character so `version\.major` names a single key, and a trailing `#` on an
//! array yields its length.

use std::borrow::Cow;

use serde_json::Value;

/// Split a path into its segments, honouring `\` escapes.
pub fn segments(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' => out.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    out.push(current);
    out
}

/// Look `path` up in `root`. Returns `None` when any segment cannot be followed.
///
/// A `null` stored at the path is found; only a missing value yields `None`.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<Cow<'a, Value>> {
    if path.is_empty() {
        return None;
    }

    let segments = segments(path);
    let mut current = root;

    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        current = match current {
            Value::Object(map) => map.get(segment.as_str())?,
            Value::Array(items) if segment == "#" => {
                // counting only makes sense at the end of the path
                return last.then(|| Cow::Owned(Value::from(items.len())));
            }
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(Cow::Borrowed(current))
}
