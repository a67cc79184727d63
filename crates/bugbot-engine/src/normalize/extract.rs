//! Locating a JSON document inside free-form model output.

use serde_json::Value;

/// Strip markdown code fences from a response
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        trimmed
    };
    clean.strip_suffix("```").unwrap_or(clean).trim()
}

/// First balanced top-level `{...}` fragment. Braces inside string literals
/// are ignored; a fragment that never closes yields `None`.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    let mut start_idx = None;

    for (i, c) in text.char_indices() {
        if start_idx.is_none() {
            if c == '{' {
                start_idx = Some(i);
                depth = 1;
            }
            continue;
        }

        if escape_next {
            escape_next = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return start_idx.map(|start| &text[start..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Try to fix common JSON issues from LLM responses
fn fix_json_issues(json: &str) -> String {
    let mut fixed = json.to_string();

    fixed = fixed.replace(",]", "]");
    fixed = fixed.replace(",}", "}");

    fixed = fixed.replace('\u{201C}', "\"");
    fixed = fixed.replace('\u{201D}', "\"");
    fixed = fixed.replace('\u{2018}', "'");
    fixed = fixed.replace('\u{2019}', "'");

    fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

fn parse_lenient(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate)
        .ok()
        .or_else(|| serde_json::from_str(&fix_json_issues(candidate)).ok())
}

/// Parse the model output into a JSON value: the first balanced object if one
/// parses, otherwise the whole (fence-stripped) text.
pub fn parse_document(raw: &str) -> Option<Value> {
    if let Some(value) = first_balanced_object(raw).and_then(parse_lenient) {
        return Some(value);
    }
    parse_lenient(strip_markdown_fences(raw))
}
