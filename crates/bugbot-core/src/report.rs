use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Raw material for one submission attempt.
///
/// Treated as immutable: follow-up rounds build a new value through
/// [`ReportInput::with_followup_answers`] or [`ReportInput::with_environment_notes`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    pub raw_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

/// Separator used when appending to environment notes.
pub const NOTES_SEPARATOR: &str = " | ";

impl ReportInput {
    pub fn new(raw_summary: impl Into<String>) -> Self {
        Self {
            raw_summary: raw_summary.into(),
            ..Self::default()
        }
    }

    /// Append free text to the environment notes. Existing notes are never replaced.
    pub fn with_environment_notes(&self, notes: &str) -> Self {
        let notes = notes.trim();
        let mut next = self.clone();
        if notes.is_empty() {
            return next;
        }
        next.environment_notes = Some(match self.environment_notes.as_deref() {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{}{}{}", existing, NOTES_SEPARATOR, notes)
            }
            _ => notes.to_string(),
        });
        next
    }

    /// Merge `label: value` answers from a follow-up round into the environment notes.
    pub fn with_followup_answers<L, V>(&self, answers: &[(L, V)]) -> Self
    where
        L: AsRef<str>,
        V: AsRef<str>,
    {
        let filled: Vec<String> = answers
            .iter()
            .filter_map(|(label, value)| {
                let value = value.as_ref().trim();
                (!value.is_empty()).then(|| format!("{}: {}", label.as_ref(), value))
            })
            .collect();
        if filled.is_empty() {
            return self.clone();
        }
        self.with_environment_notes(&filled.join(NOTES_SEPARATOR))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    #[default]
    Unspecified,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Unspecified => "unspecified",
        }
    }

    /// Coerce arbitrary text into the closed enum; anything unrecognised is `Unspecified`.
    pub fn coerce(raw: &str) -> Severity {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Unspecified,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form environment object. Known keys have accessors, anything else passes through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment(Map<String, Value>);

impl Environment {
    pub const PLATFORM: &'static str = "platform";
    pub const OS: &'static str = "os";
    pub const APP_VERSION: &'static str = "appVersion";
    pub const NETWORK_INFO: &'static str = "networkInfo";
    pub const CLIENT_TYPE: &'static str = "clientType";
    pub const CLIENT_INFO: &'static str = "clientInfo";
    pub const ADDITIONAL_DETAILS: &'static str = "additionalDetails";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn platform(&self) -> Option<&str> {
        self.get_str(Self::PLATFORM)
    }

    pub fn os(&self) -> Option<&str> {
        self.get_str(Self::OS)
    }

    pub fn app_version(&self) -> Option<&str> {
        self.get_str(Self::APP_VERSION)
    }

    pub fn network_info(&self) -> Option<&str> {
        self.get_str(Self::NETWORK_INFO)
    }
}

/// A validated bug report. See [`crate::schema`] for the limits it obeys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalReport {
    pub title: String,
    pub description: String,
    pub steps_to_reproduce: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_result: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reproducibility_score: Option<f64>,
}

impl CanonicalReport {
    /// Minimal report carrying only the required fields.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            steps_to_reproduce: Vec::new(),
            expected_result: None,
            actual_result: None,
            environment: Environment::new(),
            severity: Severity::Unspecified,
            component: None,
            attachments: None,
            sources: None,
            reasoning: None,
            reproducibility_score: None,
        }
    }

    pub fn with_steps<S: Into<String>>(mut self, steps: impl IntoIterator<Item = S>) -> Self {
        self.steps_to_reproduce = steps.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_notes_are_append_only() {
        let input = ReportInput::new("Voice drops");
        let first = input.with_environment_notes("Windows 11");
        let second = first.with_environment_notes("  VPN on ");
        assert_eq!(input.environment_notes, None);
        assert_eq!(first.environment_notes.as_deref(), Some("Windows 11"));
        assert_eq!(
            second.environment_notes.as_deref(),
            Some("Windows 11 | VPN on")
        );
    }

    #[test]
    fn test_followup_answers_skip_blank_values() {
        let input = ReportInput {
            environment_notes: Some("Desktop".to_string()),
            ..ReportInput::new("Crash")
        };
        let merged = input.with_followup_answers(&[
            ("app or browser version", "stable 483861"),
            ("operating system and version", "   "),
            ("network details", "wifi"),
        ]);
        assert_eq!(
            merged.environment_notes.as_deref(),
            Some("Desktop | app or browser version: stable 483861 | network details: wifi")
        );
        assert_eq!(merged.raw_summary, "Crash");
    }

    #[test]
    fn test_severity_coerce() {
        assert_eq!(Severity::coerce(" High "), Severity::High);
        assert_eq!(Severity::coerce("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::coerce("urgent"), Severity::Unspecified);
        assert_eq!(Severity::coerce(""), Severity::Unspecified);
    }

    #[test]
    fn test_report_serializes_camel_case_and_skips_empty_optionals() {
        let report = CanonicalReport::new("T", "D").with_steps(["1", "2"]);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["stepsToReproduce"], serde_json::json!(["1", "2"]));
        assert_eq!(value["environment"], serde_json::json!({}));
        assert_eq!(value["severity"], "unspecified");
        assert!(value.get("attachments").is_none());
        assert!(value.get("expectedResult").is_none());
    }

    #[test]
    fn test_environment_accessors_ignore_blank_and_non_string() {
        let mut env = Environment::new();
        env.insert(Environment::OS, "macOS 14");
        env.insert(Environment::PLATFORM, "  ");
        env.insert(Environment::APP_VERSION, 42);
        assert_eq!(env.os(), Some("macOS 14"));
        assert_eq!(env.platform(), None);
        assert_eq!(env.app_version(), None);
    }
}
