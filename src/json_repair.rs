//! Best-effort recovery of a JSON object from free-form model output.
//!
//! Strategies run in a fixed order and the first one that yields an object
//! wins: strict parse, code-fence strip, first-`{`-to-last-`}` substring, and
//! finally brace balancing for output that was cut off mid-object.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::util::truncate_chars;
use crate::TARGET_LLM_REQUEST;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Strict,
    FenceStripped,
    BraceSubstring,
    Balanced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub object: Map<String, Value>,
    pub strategy: Strategy,
}

fn as_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Decode `text` into a JSON object, or `None` when every strategy fails.
pub fn decode_object(text: &str) -> Option<Repaired> {
    let trimmed = text.trim();
    let found = |object, strategy| Some(Repaired { object, strategy });

    if let Some(object) = as_object(trimmed) {
        return found(object, Strategy::Strict);
    }

    let body = strip_fence(trimmed);
    if let Some(body) = body {
        if let Some(object) = as_object(body) {
            return found(object, Strategy::FenceStripped);
        }
    }
    let body = body.unwrap_or(trimmed);

    if let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) {
        if start < end {
            if let Some(object) = as_object(&body[start..=end]) {
                return found(object, Strategy::BraceSubstring);
            }
        }
    }

    let start = body.find('{')?;
    balance(&body[start..]).map(|object| Repaired {
        object,
        strategy: Strategy::Balanced,
    })
}

/// Like [`decode_object`], but an unrecoverable response becomes an empty map.
pub fn parse_object_or_empty(text: &str) -> Map<String, Value> {
    match decode_object(text) {
        Some(repaired) => {
            if repaired.strategy != Strategy::Strict {
                debug!(
                    target: TARGET_LLM_REQUEST,
                    "Recovered model JSON via {:?}", repaired.strategy
                );
            }
            repaired.object
        }
        None => {
            warn!(
                target: TARGET_LLM_REQUEST,
                "Could not recover JSON from model response: {}",
                truncate_chars(text, 200)
            );
            Map::new()
        }
    }
}

/// Body of the first code fence. An unterminated fence runs to the end.
fn strip_fence(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    // Skip the language tag, if any
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(after.len());
    let first_line = &after[..body_start];
    let body_start = if first_line.trim_start().starts_with('{') {
        0
    } else {
        body_start
    };
    let body = &after[body_start..];
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    Some(body.trim())
}

/// Close whatever `text` (starting at `{`) left open.
///
/// Tries the whole text first, then cuts back to each earlier element
/// boundary, so a dangling key or half-written literal is dropped rather than
/// guessed at.
fn balance(text: &str) -> Option<Map<String, Value>> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    // (byte offset to cut at, closers needed at that point)
    let mut cuts: Vec<(usize, Vec<char>)> = Vec::new();

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                stack.push('}');
                cuts.push((i + 1, stack.clone()));
            }
            '[' => {
                stack.push(']');
                cuts.push((i + 1, stack.clone()));
            }
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    return as_object(&text[..=i]);
                }
            }
            ',' => cuts.push((i, stack.clone())),
            _ => {}
        }
    }

    let mut head = text.trim_end().to_string();
    if in_string {
        if escaped {
            head.pop();
        }
        head.push('"');
    }
    let head = head.trim_end().trim_end_matches(',');
    if let Some(object) = as_object(&close(head, &stack)) {
        return Some(object);
    }

    cuts.iter().rev().find_map(|(at, open)| {
        let head = text[..*at].trim_end().trim_end_matches(',');
        as_object(&close(head, open))
    })
}

fn close(head: &str, open: &[char]) -> String {
    let mut out = head.to_string();
    out.extend(open.iter().rev());
    out
}
