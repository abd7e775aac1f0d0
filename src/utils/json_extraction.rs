//! JSON extraction from LLM responses.
//!
//! Models asked for "only a JSON array" still wrap it in markdown fences or
//! surround it with prose often enough that callers cannot decode responses
//! directly. The helpers here find the JSON part of a response.
//!
//! # Example
//!
//! ```
//! use synth_forge::utils::json_extraction::extract_json_array;
//!
//! let response = "Sure!\n```json\n[{\"question\": \"Q\", \"answer\": \"A\"}]\n```";
//! let records = extract_json_array(response).unwrap();
//! assert_eq!(records.len(), 1);
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[A-Za-z0-9_-]*[ \t]*\r?\n?([\s\S]*?)\r?\n?```").expect("fenced block pattern is valid")
});

/// Removes a surrounding ```` ``` ```` or ```` ```json ```` fence, if any.
///
/// Content without a fence is returned trimmed. When several fenced blocks
/// are present only the first is kept.
pub fn strip_code_fences(content: &str) -> String {
    let trimmed = content.trim();
    let fenced = FENCED_BLOCK
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string());

    match fenced {
        Some(inner) => inner,
        // An opening fence with no closing one, typical of truncated output.
        None => trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .map(|rest| rest.trim().to_string())
            .unwrap_or_else(|| trimmed.to_string()),
    }
}

/// Index of the delimiter closing the one `s` starts with.
///
/// Delimiters inside string literals, including escaped quotes, are ignored.
fn find_matching(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Index of the `}` matching the `{` that `s` starts with.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    find_matching(s, '{', '}')
}

/// Index of the `]` matching the `[` that `s` starts with.
pub fn find_matching_bracket(s: &str) -> Option<usize> {
    find_matching(s, '[', ']')
}

/// First balanced `open ... close` span in `content` that decodes as JSON.
fn first_balanced(content: &str, open: char, close: char) -> Option<Value> {
    content.match_indices(open).find_map(|(start, _)| {
        let rest = &content[start..];
        let end = find_matching(rest, open, close)?;
        serde_json::from_str(&rest[..=end]).ok()
    })
}

/// Decodes the JSON value in an LLM response.
///
/// Tries, in order: the fence-stripped response as a whole, the first
/// decodable array, then the first decodable object.
pub fn extract_json_value(content: &str) -> Option<Value> {
    let stripped = strip_code_fences(content);
    if let Ok(value) = serde_json::from_str::<Value>(&stripped) {
        if value.is_array() || value.is_object() {
            return Some(value);
        }
    }
    first_balanced(&stripped, '[', ']').or_else(|| first_balanced(&stripped, '{', '}'))
}

/// The records of an LLM response.
///
/// An array yields its elements. A lone object that wraps an array under a
/// single key (`{"examples": [...]}`) yields that array; any other object
/// yields itself. `None` when the response holds no JSON.
pub fn extract_json_array(content: &str) -> Option<Vec<Value>> {
    match extract_json_value(content)? {
        Value::Array(items) => Some(items),
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::Array(items)) = map.values().next() {
                    return Some(items.clone());
                }
            }
            Some(vec![Value::Object(map)])
        }
        _ => None,
    }
}
