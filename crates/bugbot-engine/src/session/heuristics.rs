//! Does a free-text answer already satisfy an outstanding field?
//!
//! Reporters rarely label their answers, so each field gets a predicate that
//! looks for the shape of a plausible answer. Predicates are looked up per
//! field and can be swapped individually.

use bugbot_core::ReportField;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub trait FieldPredicate: Send + Sync {
    fn is_satisfied_by(&self, text: &str) -> bool;
}

impl<F> FieldPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_satisfied_by(&self, text: &str) -> bool {
        self(text)
    }
}

fn regex_matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

/// Release channel, a dotted version, a long build number, or a browser name.
pub fn looks_like_app_version(text: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex_matches(
        &RE,
        r"(?i)\b(stable|beta|dev|canary|rc|ptb)\b|\d+\.\d+|\d{3,}|\b(chrome|safari|firefox|edge|opera|discord)\b",
        text,
    )
}

pub fn looks_like_os(text: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex_matches(
        &RE,
        r"(?i)\b(windows|macos|mac os|os x|ios|ipados|android|linux|ubuntu|chromebook|chrome os|chromeos)\b",
        text,
    )
}

pub fn looks_like_platform(text: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex_matches(
        &RE,
        r"(?i)\b(desktop|web|browser|ios|android|mobile|phone|tablet)\b",
        text,
    )
}

pub fn looks_like_network_info(text: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex_matches(
        &RE,
        r"(?i)\b(vpn|proxy|corporate network|wi-?fi|ethernet|cellular|mobile data|4g|5g)\b",
        text,
    )
}

/// More than one non-empty line, or a numbered step.
pub fn looks_like_steps(text: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let non_empty_lines = text.lines().filter(|l| !l.trim().is_empty()).count();
    non_empty_lines > 1 || regex_matches(&RE, r"(?m)^\s*\d+[.)]", text)
}

/// Minimum length of a description answer, in characters.
pub const MIN_DESCRIPTION_CHARS: usize = 10;

pub fn looks_like_description(text: &str) -> bool {
    text.trim().chars().count() > MIN_DESCRIPTION_CHARS
}

pub fn is_non_empty(text: &str) -> bool {
    !text.trim().is_empty()
}

/// Per-field predicate table.
#[derive(Clone)]
pub struct SatisfactionRules {
    predicates: HashMap<ReportField, Arc<dyn FieldPredicate>>,
    fallback: Arc<dyn FieldPredicate>,
}

impl Default for SatisfactionRules {
    fn default() -> Self {
        let mut rules = Self {
            predicates: HashMap::new(),
            fallback: Arc::new(is_non_empty),
        };
        rules.set(ReportField::AppVersion, looks_like_app_version);
        rules.set(ReportField::Os, looks_like_os);
        rules.set(ReportField::Platform, looks_like_platform);
        rules.set(ReportField::NetworkInfo, looks_like_network_info);
        rules.set(ReportField::StepsToReproduce, looks_like_steps);
        rules.set(ReportField::Description, looks_like_description);
        rules.set(ReportField::DetailedDescription, looks_like_description);
        rules
    }
}

impl SatisfactionRules {
    /// Replace the predicate for one field.
    pub fn set(&mut self, field: ReportField, predicate: impl FieldPredicate + 'static) {
        self.predicates.insert(field, Arc::new(predicate));
    }

    pub fn is_satisfied(&self, field: ReportField, text: &str) -> bool {
        self.predicates
            .get(&field)
            .unwrap_or(&self.fallback)
            .is_satisfied_by(text)
    }

    /// Outstanding fields that `text` does not satisfy, order preserved.
    pub fn unsatisfied(&self, fields: &[ReportField], text: &str) -> Vec<ReportField> {
        fields
            .iter()
            .copied()
            .filter(|field| !self.is_satisfied(*field, text))
            .collect()
    }
}
