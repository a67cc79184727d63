//! Response normalization: raw backend text in, a schema-valid report or an
//! insufficiency signal out. Malformed output never escapes as an error.

pub mod extract;
pub mod insufficiency;
pub mod sanitize;

use bugbot_core::schema;
use bugbot_core::{CanonicalReport, InsufficiencySignal};
use insufficiency::{FreeTextRecovery, InsufficiencyStrategy, StructuredFlag};

pub use sanitize::{fallback_report, sanitize_attachment, INFERRED_MARKER};

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    known_components: Vec<String>,
}

impl Normalizer {
    pub fn new(known_components: Vec<String>) -> Self {
        Self { known_components }
    }

    pub fn known_components(&self) -> &[String] {
        &self.known_components
    }

    /// Turn raw backend text into a canonical report, or the backend's request
    /// for more information.
    pub fn normalize(&self, raw: &str) -> Result<CanonicalReport, InsufficiencySignal> {
        let parsed = extract::parse_document(raw);

        if let Some(obj) = parsed.as_ref().and_then(|v| v.as_object()) {
            if let Some(signal) = StructuredFlag.detect(raw, parsed.as_ref()) {
                tracing::debug!(strategy = StructuredFlag.name(), %signal, "backend requested more information");
                return Err(signal);
            }

            let report = sanitize::sanitize_report(obj, &self.known_components);
            return match schema::validate(&report) {
                Ok(()) => Ok(report),
                Err(violations) => {
                    let reasons: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                    tracing::warn!(violations = %reasons.join("; "), "sanitized report failed validation");
                    self.recover_or_fallback(raw, None)
                }
            };
        }

        self.recover_or_fallback(raw, parsed.as_ref())
    }

    fn recover_or_fallback(
        &self,
        raw: &str,
        parsed: Option<&serde_json::Value>,
    ) -> Result<CanonicalReport, InsufficiencySignal> {
        if let Some(signal) = FreeTextRecovery.detect(raw, parsed) {
            tracing::debug!(strategy = FreeTextRecovery.name(), %signal, "recovered insufficiency from unparsed text");
            return Err(signal);
        }

        tracing::warn!(len = raw.len(), "backend output was not a usable report; using fallback");
        Ok(fallback_report(raw))
    }
}
