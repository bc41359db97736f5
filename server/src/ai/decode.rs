//! Pulls JSON out of free-form model output.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("model output contained no JSON value")]
    NoJson,
    #[error("model output JSON was malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Remove a surrounding markdown fence such as ```` ```json ... ``` ````.
///
/// Text outside the first fenced block is dropped. Input whose JSON begins
/// before any fence is returned trimmed, so backticks inside string values
/// are left alone.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    if trimmed[..start].contains(['[', '{']) {
        return trimmed;
    }

    let after_ticks = &trimmed[start + 3..];
    // The info string ends at the first newline (`json`, `JSON`, ...).
    let body = match after_ticks.find('\n') {
        Some(newline) if !after_ticks[..newline].contains('`') => &after_ticks[newline + 1..],
        _ => after_ticks,
    };

    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// The first balanced `[...]` or `{...}` in `text`.
///
/// Brackets inside string literals are ignored, as are escaped quotes.
pub fn extract_json_fragment(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ']' | '}' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let unfenced = strip_code_fences(text);
    let fragment = extract_json_fragment(unfenced).ok_or(DecodeError::NoJson)?;
    Ok(serde_json::from_str(fragment)?)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn strips_language_tagged_fences() {
        let text = "Here you go:\n```json\n[{\"title\":\"a\"}]\n```\nThanks!";
        assert_eq!(strip_code_fences(text), "[{\"title\":\"a\"}]");
        assert_eq!(strip_code_fences("  [1, 2]  "), "[1, 2]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
    }

    #[test]
    fn backticks_inside_unfenced_json_survive() {
        let text = r#"[{"title": "Document the ```sql``` snippet"}]"#;
        assert_eq!(strip_code_fences(text), text);

        let values: Vec<Value> = decode_json(text).expect("decode");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["title"], "Document the ```sql``` snippet");
    }

    #[test]
    fn fragment_respects_strings_and_nesting() {
        let text = r#"prefix {"a": "x]y", "b": [1, {"c": "\"}"}]} trailing {"d": 1}"#;
        assert_eq!(
            extract_json_fragment(text),
            Some(r#"{"a": "x]y", "b": [1, {"c": "\"}"}]}"#)
        );
        assert_eq!(extract_json_fragment("no json here"), None);
        assert_eq!(extract_json_fragment("[1, 2"), None);
        assert_eq!(extract_json_fragment("[1, 2}"), None);
    }

    #[test]
    fn decodes_fenced_array() {
        let values: Vec<Value> =
            decode_json("```json\n[{\"title\": \"Order milk\"}]\n```").expect("decode");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["title"], "Order milk");
    }

    #[test]
    fn reports_missing_and_malformed_json() {
        assert!(matches!(
            decode_json::<Vec<Value>>("I could not find any tasks."),
            Err(DecodeError::NoJson)
        ));
        assert!(matches!(
            decode_json::<Vec<Value>>("[{\"title\": }]"),
            Err(DecodeError::Malformed(_))
        ));
    }
}
