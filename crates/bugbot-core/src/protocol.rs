//! Contracts with external collaborators and the outcomes handed to the
//! presentation layer.

use crate::error::PipelineError;
use crate::field::ReportField;
use crate::report::CanonicalReport;
use serde::{Deserialize, Serialize};

/// Previously accepted reports used as style examples in prompts.
pub trait ExampleSource: Send + Sync {
    /// Return at most `limit` examples, in source order.
    fn examples(&self, limit: usize) -> Vec<CanonicalReport>;
}

impl ExampleSource for Vec<CanonicalReport> {
    fn examples(&self, limit: usize) -> Vec<CanonicalReport> {
        self.iter().take(limit).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredArticle {
    pub article: Article,
    pub score: f64,
}

/// Ranked full-text search over the support article corpus.
pub trait ArticleSearch: Send + Sync {
    fn search(&self, query: &str, limit: usize) -> Vec<ScoredArticle>;
}

/// The three outcomes the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Report {
        /// Id under which the report can be fetched again while cached.
        id: String,
        report: CanonicalReport,
    },
    NeedMoreInfo {
        /// Id of the pending follow-up that answers should be submitted to.
        followup_id: String,
        fields: Vec<ReportField>,
        message: String,
    },
    Fatal {
        message: String,
    },
}

impl GenerationOutcome {
    pub fn fatal(err: &PipelineError) -> Self {
        GenerationOutcome::Fatal {
            message: err.user_message(),
        }
    }

    pub fn is_report(&self) -> bool {
        matches!(self, GenerationOutcome::Report { .. })
    }
}
