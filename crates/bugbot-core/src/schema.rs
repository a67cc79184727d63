//! Canonical report schema: length ceilings, sentinel values and the validator
//! every finished report must pass.

use crate::report::CanonicalReport;
use std::fmt;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 5000;
pub const STEP_MAX_CHARS: usize = 500;
pub const RESULT_MAX_CHARS: usize = 1000;
pub const REASONING_MAX_CHARS: usize = 2000;
pub const COMPONENT_MAX_CHARS: usize = 200;
pub const ATTACHMENTS_MAX: usize = 10;
pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

/// Literal a backend may emit in place of report text when it lacks information.
pub const INSUFFICIENCY_SENTINEL: &str = "NEED_MORE_INFO";

pub const DEFAULT_TITLE: &str = "Untitled bug report";
pub const DEFAULT_DESCRIPTION: &str = "No description provided.";
pub const PLACEHOLDER_STEP: &str = "See description above";
/// Replaces the insufficiency sentinel when raw text is echoed back as a description.
pub const SENTINEL_REPLACEMENT: &str = "[the AI reported that more information is needed]";

/// Values that carry no information when they show up as a title or description.
const PLACEHOLDER_VALUES: [&str; 12] = [
    "",
    "null",
    "undefined",
    "none",
    "n/a",
    "na",
    "tbd",
    "todo",
    "...",
    "untitled",
    "needmoreinfo",
    "need_more_info",
];

/// True if `text` is empty, a known placeholder, or the insufficiency sentinel.
pub fn is_placeholder_text(text: &str) -> bool {
    let lower = text.trim().to_ascii_lowercase();
    PLACEHOLDER_VALUES.contains(&lower.as_str()) || lower == DEFAULT_DESCRIPTION.to_ascii_lowercase()
}

/// Case-insensitively replace every occurrence of the insufficiency sentinel.
pub fn replace_sentinel(text: &str) -> String {
    let needle = INSUFFICIENCY_SENTINEL.to_ascii_lowercase();
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    // ASCII lowercasing keeps byte offsets aligned with the original text.
    while let Some(found) = lower[cursor..].find(&needle) {
        let start = cursor + found;
        out.push_str(&text[cursor..start]);
        out.push_str(SENTINEL_REPLACEMENT);
        cursor = start + needle.len();
    }
    out.push_str(&text[cursor..]);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

fn check_len(
    violations: &mut Vec<SchemaViolation>,
    field: &'static str,
    value: &str,
    max: usize,
) {
    let count = value.chars().count();
    if count > max {
        violations.push(SchemaViolation {
            field,
            reason: format!("{} chars exceeds {}", count, max),
        });
    }
}

fn is_http_url(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Validate a report against the canonical schema. Returns every violation found.
pub fn validate(report: &CanonicalReport) -> Result<(), Vec<SchemaViolation>> {
    let mut violations = Vec::new();

    if report.title.trim().is_empty() || is_placeholder_text(&report.title) {
        violations.push(SchemaViolation {
            field: "title",
            reason: "missing or placeholder".to_string(),
        });
    }
    check_len(&mut violations, "title", &report.title, TITLE_MAX_CHARS);

    if report.description.trim().is_empty() {
        violations.push(SchemaViolation {
            field: "description",
            reason: "missing".to_string(),
        });
    }
    if report
        .description
        .trim()
        .eq_ignore_ascii_case(INSUFFICIENCY_SENTINEL)
    {
        violations.push(SchemaViolation {
            field: "description",
            reason: "insufficiency sentinel".to_string(),
        });
    }
    check_len(
        &mut violations,
        "description",
        &report.description,
        DESCRIPTION_MAX_CHARS,
    );

    if report.steps_to_reproduce.is_empty() && !is_placeholder_text(&report.description) {
        violations.push(SchemaViolation {
            field: "stepsToReproduce",
            reason: "empty while description is present".to_string(),
        });
    }
    for step in &report.steps_to_reproduce {
        check_len(&mut violations, "stepsToReproduce", step, STEP_MAX_CHARS);
    }

    if let Some(expected) = &report.expected_result {
        check_len(&mut violations, "expectedResult", expected, RESULT_MAX_CHARS);
    }
    if let Some(actual) = &report.actual_result {
        check_len(&mut violations, "actualResult", actual, RESULT_MAX_CHARS);
    }
    if let Some(reasoning) = &report.reasoning {
        check_len(&mut violations, "reasoning", reasoning, REASONING_MAX_CHARS);
    }

    if let Some(attachments) = &report.attachments {
        if attachments.is_empty() || attachments.len() > ATTACHMENTS_MAX {
            violations.push(SchemaViolation {
                field: "attachments",
                reason: format!("{} entries (expected 1..={})", attachments.len(), ATTACHMENTS_MAX),
            });
        }
        if attachments.iter().any(|url| !is_http_url(url)) {
            violations.push(SchemaViolation {
                field: "attachments",
                reason: "non-http(s) url".to_string(),
            });
        }
    }

    if let Some(score) = report.reproducibility_score {
        if !score.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&score) {
            violations.push(SchemaViolation {
                field: "reproducibilityScore",
                reason: format!("{} outside {}..={}", score, SCORE_MIN, SCORE_MAX),
            });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}
