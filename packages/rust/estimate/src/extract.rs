//! Pull a single JSON object out of free-form generation output.
//!
//! Models wrap their answer in prose or a fenced block often enough that
//! parsing the raw text is not sufficient. Extraction either yields a fully
//! parsed object or fails with [`WelfareBridgeError::Extraction`]; there is
//! no partial result.
//!
//! The brace scan counts `{` and `}` without tracking string literals, so a
//! brace inside a quoted value in prose-wrapped output ends the candidate
//! early and extraction fails. Bare or fenced JSON is unaffected because it
//! parses before the scan runs.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use welfarebridge_shared::{Result, WelfareBridgeError};

/// Opening fence with an optional language tag, e.g. "```json".
static FENCE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").expect("fence open regex"));

/// Closing fence at the very end.
static FENCE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?[ \t]*```$").expect("fence close regex"));

/// Extract one JSON object from `text`.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>> {
    let body = strip_fence(text.trim());

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(_) => {
            return Err(WelfareBridgeError::extraction(
                "output is valid JSON but not an object",
            ));
        }
        Err(_) => {}
    }

    let candidate = balanced_object(body)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(WelfareBridgeError::extraction(
            "bounded candidate is not a JSON object",
        )),
        Err(e) => Err(WelfareBridgeError::extraction(format!(
            "bounded candidate is not valid JSON: {e}"
        ))),
    }
}

/// Strip a leading and trailing fence marker, only when both are present.
fn strip_fence(s: &str) -> &str {
    let (Some(open), Some(close)) = (FENCE_OPEN_RE.find(s), FENCE_CLOSE_RE.find(s)) else {
        return s;
    };
    if open.end() > close.start() {
        // A lone "```" matches both patterns.
        return s;
    }
    s[open.end()..close.start()].trim()
}

/// Slice from the first `{` to the brace that returns depth to zero.
fn balanced_object(s: &str) -> Result<&str> {
    let start = s
        .find('{')
        .ok_or_else(|| WelfareBridgeError::extraction("no JSON object found"))?;

    let mut depth = 1usize;
    for (offset, ch) in s[start + 1..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + 1 + offset + ch.len_utf8();
                    return Ok(&s[start..end]);
                }
            }
            _ => {}
        }
    }

    Err(WelfareBridgeError::extraction("unbalanced JSON braces"))
}
