//! Detecting a backend's "I need more information" verdict.
//!
//! Two strategies run in order: a structured check on a parsed JSON object and
//! a regex recovery over raw text for output that never parsed (truncated
//! objects, prose around a half-written flag).

use bugbot_core::schema::INSUFFICIENCY_SENTINEL;
use bugbot_core::{InsufficiencySignal, ReportField};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const UNRECOGNIZED_FIELDS_MESSAGE: &str =
    "The AI requested more information but none of the requested fields are recognized";

pub trait InsufficiencyStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `parsed` is the decoded document when the raw text parsed as JSON.
    fn detect(&self, raw: &str, parsed: Option<&Value>) -> Option<InsufficiencySignal>;
}

fn build_signal(requests: &[String], message: Option<String>) -> InsufficiencySignal {
    let fields = ReportField::decode_all(requests);
    if fields.is_empty() {
        let message = match message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            Some(model_message) => format!("{}: {}", UNRECOGNIZED_FIELDS_MESSAGE, model_message),
            None => UNRECOGNIZED_FIELDS_MESSAGE.to_string(),
        };
        return InsufficiencySignal::new(Vec::new(), Some(message));
    }
    InsufficiencySignal::new(fields, message)
}

/// Reads `needMoreInfo` / `missingFields` / `message` off a parsed object.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredFlag;

impl StructuredFlag {
    fn flag_set(obj: &serde_json::Map<String, Value>) -> bool {
        ["needMoreInfo", "need_more_info"]
            .iter()
            .filter_map(|key| obj.get(*key))
            .any(|value| match value {
                Value::Bool(flag) => *flag,
                Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
                _ => false,
            })
    }

    fn requests(obj: &serde_json::Map<String, Value>) -> Vec<String> {
        let raw = obj.get("missingFields").or_else(|| obj.get("missing_fields"));
        match raw {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(list)) => list.split(',').map(|s| s.trim().to_string()).collect(),
            _ => Vec::new(),
        }
    }
}

impl InsufficiencyStrategy for StructuredFlag {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn detect(&self, _raw: &str, parsed: Option<&Value>) -> Option<InsufficiencySignal> {
        let obj = parsed?.as_object()?;
        if !Self::flag_set(obj) {
            return None;
        }
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(build_signal(&Self::requests(obj), message))
    }
}

fn flag_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)"?need_?more_?info"?\s*[:=]\s*"?true"#).ok())
        .as_ref()
}

fn sentinel_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"(?i)\b{}\b", INSUFFICIENCY_SENTINEL)).ok())
        .as_ref()
}

fn fields_list_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?is)"?missing_?fields"?\s*[:=]\s*\[([^\]]*)\]?"#).ok())
        .as_ref()
}

fn fields_string_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)"?missing_?fields"?\s*[:=]\s*"([^"]*)""#).ok())
        .as_ref()
}

fn quoted_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]*)"|'([^']*)'"#).ok())
        .as_ref()
}

fn message_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?is)"?message"?\s*[:=]\s*"((?:[^"\\]|\\.)*)""#).ok())
        .as_ref()
}

/// Pattern-matches the flag, field list and message out of unparseable text.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeTextRecovery;

impl FreeTextRecovery {
    fn requests(raw: &str) -> Vec<String> {
        if let Some(caps) = fields_list_regex().and_then(|re| re.captures(raw)) {
            let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let quoted: Vec<String> = quoted_regex()
                .map(|re| {
                    re.captures_iter(inner)
                        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
                        .map(|m| m.as_str().to_string())
                        .collect()
                })
                .unwrap_or_default();
            if !quoted.is_empty() {
                return quoted;
            }
            return inner
                .split(',')
                .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(caps) = fields_string_regex().and_then(|re| re.captures(raw)) {
            if let Some(list) = caps.get(1) {
                return list.as_str().split(',').map(|s| s.trim().to_string()).collect();
            }
        }
        Vec::new()
    }

    fn message(raw: &str) -> Option<String> {
        message_regex()
            .and_then(|re| re.captures(raw))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().replace("\\\"", "\""))
    }
}

impl InsufficiencyStrategy for FreeTextRecovery {
    fn name(&self) -> &'static str {
        "free_text"
    }

    fn detect(&self, raw: &str, _parsed: Option<&Value>) -> Option<InsufficiencySignal> {
        let flagged = flag_regex().is_some_and(|re| re.is_match(raw))
            || sentinel_regex().is_some_and(|re| re.is_match(raw));
        if !flagged {
            return None;
        }
        Some(build_signal(&Self::requests(raw), Self::message(raw)))
    }
}
