//! Error kinds surfaced by the report pipeline.
//!
//! Malformed backend output has no variant here: the normalizer always turns
//! it into a usable fallback report.

use crate::field::ReportField;
use std::fmt;
use thiserror::Error;

/// The backend affirmatively said it needs more information.
///
/// A data verdict for one generation attempt, not a fault: it is never retried
/// and never triggers backend failover.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InsufficiencySignal {
    missing_fields: Vec<ReportField>,
    message: Option<String>,
}

impl InsufficiencySignal {
    pub fn new(fields: impl IntoIterator<Item = ReportField>, message: Option<String>) -> Self {
        let mut missing_fields = Vec::new();
        for field in fields {
            if !missing_fields.contains(&field) {
                missing_fields.push(field);
            }
        }
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        Self {
            missing_fields,
            message,
        }
    }

    /// Ordered, de-duplicated canonical fields (possibly empty).
    pub fn missing_fields(&self) -> &[ReportField] {
        &self.missing_fields
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// True when the backend asked for nothing this pipeline can collect.
    pub fn is_unactionable(&self) -> bool {
        self.missing_fields.is_empty()
    }

    /// Prompt shown to the reporter naming what is still needed.
    pub fn user_message(&self) -> String {
        if self.missing_fields.is_empty() {
            return format!(
                "The AI could not finish the report but did not say what is missing. {}",
                self.message
                    .as_deref()
                    .unwrap_or("Please add more detail about what happened and try again.")
            );
        }
        let labels: Vec<&str> = self.missing_fields.iter().map(|f| f.label()).collect();
        format!(
            "The AI needs more information before it can finish the report. Please provide: **{}**.",
            labels.join(", ")
        )
    }
}

impl fmt::Display for InsufficiencySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.missing_fields.iter().map(|f| f.id()).collect();
        write!(f, "more information needed [{}]", ids.join(", "))?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for InsufficiencySignal {}

/// Transport-level failure talking to a generation backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("could not connect: {0}")]
    Network(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend returned an empty response")]
    EmptyResponse,

    #[error("could not decode backend envelope: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Insufficient(#[from] InsufficiencySignal),

    #[error("{backend} backend failed: {source}")]
    Infrastructure {
        backend: String,
        #[source]
        source: BackendError,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        PipelineError::Configuration(message.into())
    }

    pub fn infrastructure(backend: impl Into<String>, source: BackendError) -> Self {
        PipelineError::Infrastructure {
            backend: backend.into(),
            source,
        }
    }

    pub fn insufficiency(&self) -> Option<&InsufficiencySignal> {
        match self {
            PipelineError::Insufficient(signal) => Some(signal),
            _ => None,
        }
    }

    /// Text shown to the reporter. Faults stay generic; insufficiency names the gap.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Insufficient(signal) => signal.user_message(),
            PipelineError::Infrastructure { .. } | PipelineError::Configuration(_) => {
                "Sorry, I couldn't generate the bug report automatically. Please try again in a moment."
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_dedupes_fields_and_blank_message() {
        let signal = InsufficiencySignal::new(
            [ReportField::Os, ReportField::AppVersion, ReportField::Os],
            Some("  ".to_string()),
        );
        assert_eq!(
            signal.missing_fields(),
            &[ReportField::Os, ReportField::AppVersion]
        );
        assert_eq!(signal.message(), None);
        assert!(!signal.is_unactionable());
    }

    #[test]
    fn test_signal_user_message_names_labels() {
        let signal = InsufficiencySignal::new([ReportField::AppVersion], None);
        assert!(signal.user_message().contains("app or browser version"));
    }

    #[test]
    fn test_pipeline_error_user_messages() {
        let err = PipelineError::infrastructure("ollama", BackendError::Timeout(300_000));
        assert!(err.user_message().contains("try again"));
        assert!(err.to_string().contains("ollama"));
        assert!(err.insufficiency().is_none());

        let err = PipelineError::from(InsufficiencySignal::new([ReportField::Os], None));
        assert!(err.insufficiency().is_some());
        assert!(err.user_message().contains("operating system"));
    }
}
