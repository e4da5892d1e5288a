//! Repair and extraction of JSON payloads from completion-service text.
//!
//! Completion responses are free-form text that is expected to contain one JSON
//! document, often wrapped in a fenced code block and sometimes with trailing
//! commas. These helpers recover the document where that can be done safely.

use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("response contains no JSON payload")]
    NoPayload,
    #[error("response payload is not valid: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Removes ```` ```json ```` / ```` ``` ```` markers and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// The slice from the first `{` or `[` to the matching last `}` or `]`.
pub fn extract_json_payload(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Drops commas that directly precede a closing `}` or `]`, outside string literals.
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parses a typed payload out of completion text, repairing what can be repaired.
pub fn parse_payload<T: DeserializeOwned>(text: &str) -> Result<T, PayloadError> {
    let cleaned = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str(&cleaned) {
        return Ok(value);
    }
    let payload = extract_json_payload(&cleaned).ok_or(PayloadError::NoPayload)?;
    match serde_json::from_str(payload) {
        Ok(value) => Ok(value),
        Err(_) => Ok(serde_json::from_str(&remove_trailing_commas(payload))?),
    }
}

/// Finds the `"planTitle"` string value in text that may not parse as JSON at all.
pub fn extract_plan_title(text: &str) -> Option<String> {
    let key = text.find("\"planTitle\"")?;
    let rest = text[key + "\"planTitle\"".len()..].trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    let rest = rest.strip_prefix('"')?;

    let mut title = String::new();
    let mut escaped = false;
    for c in rest.chars() {
        match (escaped, c) {
            (true, _) => {
                title.push(c);
                escaped = false;
            }
            (false, '\\') => escaped = true,
            (false, '"') => {
                let title = title.trim().to_string();
                return (!title.is_empty()).then_some(title);
            }
            (false, _) => title.push(c),
        }
    }
    None
}
