//! Field-level sanitization of a parsed report object.

use crate::util::{strip_control_chars, truncate_str};
use bugbot_core::schema::{
    is_placeholder_text, replace_sentinel, ATTACHMENTS_MAX, COMPONENT_MAX_CHARS, DEFAULT_DESCRIPTION,
    DEFAULT_TITLE, DESCRIPTION_MAX_CHARS, PLACEHOLDER_STEP, REASONING_MAX_CHARS, RESULT_MAX_CHARS,
    SCORE_MAX, SCORE_MIN, STEP_MAX_CHARS, TITLE_MAX_CHARS,
};
use bugbot_core::{CanonicalReport, Environment, Severity};
use serde_json::{Map, Value};
use url::Url;

/// Marker appended to a component name the backend guessed.
pub const INFERRED_MARKER: &str = "(inferred)";

/// Query parameter names containing any of these are dropped from attachment URLs.
const SENSITIVE_PARAM_PATTERNS: [&str; 7] = [
    "token",
    "auth",
    "sig",
    "key",
    "secret",
    "password",
    "credential",
];

fn clip(text: &str, max: usize) -> String {
    truncate_str(text.trim(), max).trim_end().to_string()
}

/// Non-empty text from a string or scalar value.
fn text_of(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    let text = strip_control_chars(&text);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn optional_text(value: Option<&Value>, max: usize) -> Option<String> {
    text_of(value)
        .filter(|t| !is_placeholder_text(t))
        .map(|t| clip(&replace_sentinel(&t), max))
}

fn title(obj: &Map<String, Value>) -> String {
    match text_of(obj.get("title")) {
        Some(t) if !is_placeholder_text(&t) => clip(&replace_sentinel(&t), TITLE_MAX_CHARS),
        _ => DEFAULT_TITLE.to_string(),
    }
}

fn description(obj: &Map<String, Value>) -> String {
    match text_of(obj.get("description")) {
        Some(d) if !is_placeholder_text(&d) => {
            clip(&replace_sentinel(&d), DESCRIPTION_MAX_CHARS)
        }
        _ => DEFAULT_DESCRIPTION.to_string(),
    }
}

/// String entries only; everything else is discarded.
fn steps(obj: &Map<String, Value>, description: &str) -> Vec<String> {
    let mut steps: Vec<String> = obj
        .get("stepsToReproduce")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(strip_control_chars)
                .filter(|s| !s.trim().is_empty() && !is_placeholder_text(s))
                .map(|s| clip(&replace_sentinel(&s), STEP_MAX_CHARS))
                .collect()
        })
        .unwrap_or_default();
    if steps.is_empty() && !is_placeholder_text(description) {
        steps.push(PLACEHOLDER_STEP.to_string());
    }
    steps
}

/// The environment object is carried over exactly as the backend wrote it.
fn environment(obj: &Map<String, Value>) -> Environment {
    obj.get("environment")
        .and_then(Value::as_object)
        .map(|map| Environment::from_map(map.clone()))
        .unwrap_or_default()
}

fn severity(obj: &Map<String, Value>) -> Severity {
    obj.get("severity")
        .and_then(Value::as_str)
        .map(Severity::coerce)
        .unwrap_or_default()
}

/// Keep a component only if it names a known one, or mark it as inferred.
pub fn component(raw: Option<&str>, known_components: &[String]) -> Option<String> {
    let raw = raw.map(str::trim).filter(|c| !c.is_empty() && !is_placeholder_text(c))?;
    if known_components.is_empty() {
        return Some(clip(raw, COMPONENT_MAX_CHARS));
    }
    let bare = raw
        .strip_suffix(INFERRED_MARKER)
        .map(str::trim_end)
        .unwrap_or(raw);
    if let Some(known) = known_components
        .iter()
        .find(|known| known.eq_ignore_ascii_case(bare))
    {
        return Some(known.clone());
    }
    let max_bare = COMPONENT_MAX_CHARS.saturating_sub(INFERRED_MARKER.len() + 1);
    Some(format!("{} {}", clip(bare, max_bare), INFERRED_MARKER))
}

fn is_sensitive_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_PARAM_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Accept http(s) URLs only, with embedded credentials and sensitive query
/// parameters removed.
pub fn sanitize_attachment(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    let _ = url.set_username("");
    let _ = url.set_password(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| !is_sensitive_param(name))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Some(url.to_string())
}

fn attachments(obj: &Map<String, Value>) -> Option<Vec<String>> {
    let items = obj.get("attachments")?.as_array()?;
    let mut kept: Vec<String> = Vec::new();
    for url in items.iter().filter_map(Value::as_str).filter_map(sanitize_attachment) {
        if kept.len() >= ATTACHMENTS_MAX {
            break;
        }
        if !kept.contains(&url) {
            kept.push(url);
        }
    }
    (!kept.is_empty()).then_some(kept)
}

fn sources(obj: &Map<String, Value>) -> Option<Vec<String>> {
    let items = obj.get("sources")?.as_array()?;
    let kept: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!kept.is_empty()).then_some(kept)
}

fn reproducibility_score(obj: &Map<String, Value>) -> Option<f64> {
    let score = match obj.get("reproducibilityScore")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    score.is_finite().then(|| score.clamp(SCORE_MIN, SCORE_MAX))
}

/// Build a canonical report from a parsed object, repairing what can be repaired.
pub fn sanitize_report(obj: &Map<String, Value>, known_components: &[String]) -> CanonicalReport {
    let title = title(obj);
    let description = description(obj);
    let steps = steps(obj, &description);

    CanonicalReport {
        steps_to_reproduce: steps,
        expected_result: optional_text(obj.get("expectedResult"), RESULT_MAX_CHARS),
        actual_result: optional_text(obj.get("actualResult"), RESULT_MAX_CHARS),
        environment: environment(obj),
        severity: severity(obj),
        component: component(obj.get("component").and_then(Value::as_str), known_components),
        attachments: attachments(obj),
        sources: sources(obj),
        reasoning: optional_text(obj.get("reasoning"), REASONING_MAX_CHARS),
        reproducibility_score: reproducibility_score(obj),
        ..CanonicalReport::new(title, description)
    }
}

/// Report built from unusable output: default title, the raw text as description.
pub fn fallback_report(raw: &str) -> CanonicalReport {
    let cleaned = replace_sentinel(&strip_control_chars(raw));
    let description = clip(&cleaned, DESCRIPTION_MAX_CHARS);
    let description = if is_placeholder_text(&description) {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        description
    };
    CanonicalReport::new(DEFAULT_TITLE, description).with_steps([PLACEHOLDER_STEP])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugbot_core::schema::{validate, INSUFFICIENCY_SENTINEL};
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_long_title_truncated_to_limit() {
        let report = sanitize_report(
            &obj(json!({ "title": "t".repeat(250), "description": "d", "stepsToReproduce": ["s"] })),
            &[],
        );
        assert_eq!(report.title.chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn test_placeholder_title_and_description_replaced() {
        let report = sanitize_report(
            &obj(json!({ "title": INSUFFICIENCY_SENTINEL, "description": "null" })),
            &[],
        );
        assert_eq!(report.title, DEFAULT_TITLE);
        assert_eq!(report.description, DEFAULT_DESCRIPTION);
        assert!(report.steps_to_reproduce.is_empty());
        assert!(validate(&report).is_ok());
    }

    #[test]
    fn test_non_string_steps_dropped_and_placeholder_synthesized() {
        let report = sanitize_report(
            &obj(json!({ "title": "Crash", "description": "It crashes", "stepsToReproduce": [1, null, {"a": 1}] })),
            &[],
        );
        assert_eq!(report.steps_to_reproduce, vec![PLACEHOLDER_STEP]);

        let report = sanitize_report(
            &obj(json!({ "title": "Crash", "description": "It crashes", "stepsToReproduce": ["Open", 2, " Click "] })),
            &[],
        );
        assert_eq!(report.steps_to_reproduce, vec!["Open", "Click"]);
    }

    #[test]
    fn test_attachments_filtered_and_stripped() {
        let report = sanitize_report(
            &obj(json!({
                "title": "Crash",
                "description": "d",
                "stepsToReproduce": ["s"],
                "attachments": [
                    "javascript:alert(1)",
                    "ftp://files.example.com/log.txt",
                    "https://cdn.example.com/shot.png?token=abc&width=300&X-Amz-Signature=zz",
                    42
                ]
            })),
            &[],
        );
        assert_eq!(
            report.attachments,
            Some(vec!["https://cdn.example.com/shot.png?width=300".to_string()])
        );
    }

    #[test]
    fn test_attachments_removed_when_nothing_survives() {
        let report = sanitize_report(
            &obj(json!({ "title": "T", "description": "d", "attachments": ["data:text/plain,hi"] })),
            &[],
        );
        assert_eq!(report.attachments, None);
    }

    #[test]
    fn test_attachments_capped() {
        let urls: Vec<String> = (0..15)
            .map(|i| format!("https://example.com/{}.png", i))
            .collect();
        let report = sanitize_report(
            &obj(json!({ "title": "T", "description": "d", "attachments": urls })),
            &[],
        );
        assert_eq!(report.attachments.map(|a| a.len()), Some(ATTACHMENTS_MAX));
    }

    #[test]
    fn test_sanitize_attachment_strips_credentials_and_all_sensitive_query() {
        assert_eq!(
            sanitize_attachment("https://user:pw@example.com/a.png?auth=1").as_deref(),
            Some("https://example.com/a.png")
        );
        assert_eq!(sanitize_attachment("not a url"), None);
    }

    #[test]
    fn test_score_clamped_and_severity_coerced() {
        let report = sanitize_report(
            &obj(json!({ "title": "T", "description": "d", "reproducibilityScore": 140, "severity": "URGENT" })),
            &[],
        );
        assert_eq!(report.reproducibility_score, Some(100.0));
        assert_eq!(report.severity, Severity::Unspecified);

        let report = sanitize_report(
            &obj(json!({ "title": "T", "description": "d", "reproducibilityScore": "-5", "severity": "High" })),
            &[],
        );
        assert_eq!(report.reproducibility_score, Some(0.0));
        assert_eq!(report.severity, Severity::High);
    }

    #[test]
    fn test_component_whitelist() {
        let known = vec!["Voice".to_string(), "Chat".to_string()];
        assert_eq!(component(Some("voice"), &known).as_deref(), Some("Voice"));
        assert_eq!(
            component(Some("Voice (inferred)"), &known).as_deref(),
            Some("Voice")
        );
        assert_eq!(
            component(Some("Overlay"), &known).as_deref(),
            Some("Overlay (inferred)")
        );
        assert_eq!(component(Some("Overlay"), &[]).as_deref(), Some("Overlay"));
        assert_eq!(component(Some("  "), &known), None);
    }

    #[test]
    fn test_environment_passed_through_unchanged() {
        let env = json!({ "os": "", "custom": null, "appVersion": "N/A", "build": 1234 });
        let report = sanitize_report(
            &obj(json!({ "title": "T", "description": "d", "environment": env.clone() })),
            &[],
        );
        assert_eq!(serde_json::to_value(&report.environment).unwrap(), env);
        assert_eq!(report.environment.os(), None);

        let report = sanitize_report(
            &obj(json!({ "title": "T", "description": "d", "environment": "Windows" })),
            &[],
        );
        assert!(report.environment.is_empty());
    }

    #[test]
    fn test_long_description_truncated_to_limit() {
        let report = sanitize_report(
            &obj(json!({ "title": "T", "description": "d".repeat(6000), "stepsToReproduce": ["s"] })),
            &[],
        );
        assert_eq!(report.description.chars().count(), DESCRIPTION_MAX_CHARS);
    }

    #[test]
    fn test_fallback_report_is_valid_and_sentinel_free() {
        let report = fallback_report("garbage NEED_MORE_INFO text");
        assert_eq!(report.title, DEFAULT_TITLE);
        assert!(!report.description.contains(INSUFFICIENCY_SENTINEL));
        assert_eq!(report.steps_to_reproduce, vec![PLACEHOLDER_STEP]);
        assert!(validate(&report).is_ok());

        let report = fallback_report("   ");
        assert_eq!(report.description, DEFAULT_DESCRIPTION);
        assert!(validate(&report).is_ok());
    }
}
