//! One-shot report flow: submit once, answer follow-up questions or ask for a
//! best-effort report, and fetch finished reports by id while they are cached.

use crate::llm::Orchestrator;
use crate::store::ExpiringStore;
use crate::util::truncate_str;
use bugbot_core::schema::{
    is_placeholder_text, replace_sentinel, DEFAULT_DESCRIPTION, DEFAULT_TITLE, DESCRIPTION_MAX_CHARS, PLACEHOLDER_STEP, STEP_MAX_CHARS,
    TITLE_MAX_CHARS,
};
use bugbot_core::{
    ArticleSearch, CanonicalReport, Clock, Environment, GenerationOutcome, PipelineError,
    ReportField, ReportInput, ScoredArticle, Severity,
};
use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

pub const RELATED_ARTICLES_LIMIT: usize = 3;

pub const FOLLOWUP_EXPIRED_MESSAGE: &str = "This follow-up session has expired. Please submit the bug report again.";

/// A submission waiting on answers to the backend's questions.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFollowup {
    pub input: ReportInput,
    pub fields: Vec<ReportField>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub outcome: GenerationOutcome,
    /// Support articles related to the summary; empty unless a report was produced.
    pub related_articles: Vec<ScoredArticle>,
}

pub struct ReportPipeline {
    orchestrator: Arc<Orchestrator>,
    reports: ExpiringStore<String, CanonicalReport>,
    followups: ExpiringStore<String, PendingFollowup>,
    articles: Option<Arc<dyn ArticleSearch>>,
}

impl ReportPipeline {
    pub fn new(orchestrator: Arc<Orchestrator>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            orchestrator,
            reports: ExpiringStore::new(ttl, clock.clone()),
            followups: ExpiringStore::new(ttl, clock),
            articles: None,
        }
    }

    pub fn with_article_search(mut self, search: Arc<dyn ArticleSearch>) -> Self {
        self.articles = Some(search);
        self
    }

    pub async fn submit(&self, input: ReportInput) -> Submission {
        let query = article_query(&input);
        let outcome = self.run(input, None).await;
        let related_articles = match (&outcome, &self.articles) {
            (GenerationOutcome::Report { .. }, Some(search)) => {
                search.search(&query, RELATED_ARTICLES_LIMIT)
            }
            _ => Vec::new(),
        };
        Submission {
            outcome,
            related_articles,
        }
    }

    /// Merge `label: value` answers into the pending input and try again.
    pub async fn submit_followup(
        &self,
        followup_id: &str,
        answers: &[(ReportField, String)],
    ) -> GenerationOutcome {
        let Some(pending) = self.followups.get(&followup_id.to_string()) else {
            return GenerationOutcome::Fatal {
                message: FOLLOWUP_EXPIRED_MESSAGE.to_string(),
            };
        };
        let labelled: Vec<(&str, &str)> = answers
            .iter()
            .map(|(field, value)| (field.label(), value.as_str()))
            .collect();
        let merged = pending.input.with_followup_answers(&labelled);
        self.run(merged, Some(followup_id.to_string())).await
    }

    /// Produce a report from what is already known, without asking anything else.
    pub async fn generate_anyway(&self, followup_id: &str) -> GenerationOutcome {
        let key = followup_id.to_string();
        let Some(pending) = self.followups.get(&key) else {
            return GenerationOutcome::Fatal {
                message: FOLLOWUP_EXPIRED_MESSAGE.to_string(),
            };
        };
        let report = match self.orchestrator.generate(&pending.input).await {
            Ok(report) => report,
            Err(PipelineError::Insufficient(signal)) => {
                tracing::info!(followup = followup_id, %signal, "backend still wants more; building report locally");
                best_effort_report(&pending.input)
            }
            Err(err) => {
                tracing::error!(followup = followup_id, error = %err, "generate-anyway failed");
                return GenerationOutcome::fatal(&err);
            }
        };
        self.followups.remove(&key);
        self.finish(report)
    }

    async fn run(&self, input: ReportInput, followup_id: Option<String>) -> GenerationOutcome {
        match self.orchestrator.generate(&input).await {
            Ok(report) => {
                if let Some(id) = &followup_id {
                    self.followups.remove(id);
                }
                self.finish(report)
            }
            Err(PipelineError::Insufficient(signal)) => {
                let id = followup_id.unwrap_or_else(|| Uuid::new_v4().to_string());
                let fields = signal.missing_fields().to_vec();
                self.followups.insert(
                    id.clone(),
                    PendingFollowup {
                        input,
                        fields: fields.clone(),
                        message: signal.message().map(str::to_string),
                    },
                );
                GenerationOutcome::NeedMoreInfo {
                    followup_id: id,
                    fields,
                    message: signal.user_message(),
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to generate bug report");
                GenerationOutcome::fatal(&err)
            }
        }
    }

    fn finish(&self, report: CanonicalReport) -> GenerationOutcome {
        let id = Uuid::new_v4().to_string();
        self.reports.insert(id.clone(), report.clone());
        GenerationOutcome::Report { id, report }
    }

    /// A finished report, while it is still cached.
    pub fn report(&self, id: &str) -> Option<CanonicalReport> {
        self.reports.get(&id.to_string())
    }

    pub fn pending_followup(&self, id: &str) -> Option<PendingFollowup> {
        self.followups.get(&id.to_string())
    }

    pub fn sweep_expired(&self) -> usize {
        self.reports.sweep_expired() + self.followups.sweep_expired()
    }
}

fn article_query(input: &ReportInput) -> String {
    match input.detailed_description.as_deref() {
        Some(detail) if !detail.trim().is_empty() => format!("{} {}", input.raw_summary, detail),
        _ => input.raw_summary.clone(),
    }
}

/// First candidate carrying real text, sentinel-free and clipped to `max`.
fn clip_or(candidates: &[Option<&str>], max: usize, default: &str) -> String {
    candidates
        .iter()
        .flatten()
        .map(|t| t.trim())
        .find(|t| !is_placeholder_text(t))
        .map(|t| truncate_str(&replace_sentinel(t), max).trim_end().to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Report assembled directly from the reporter's input.
pub fn best_effort_report(input: &ReportInput) -> CanonicalReport {
    let summary = Some(input.raw_summary.as_str());
    let title = clip_or(&[summary], TITLE_MAX_CHARS, DEFAULT_TITLE);
    let description = clip_or(
        &[input.detailed_description.as_deref(), summary],
        DESCRIPTION_MAX_CHARS,
        DEFAULT_DESCRIPTION,
    );
    let mut steps: Vec<String> = input
        .steps
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| truncate_str(s, STEP_MAX_CHARS).to_string())
        .collect();
    if steps.is_empty() {
        steps.push(PLACEHOLDER_STEP.to_string());
    }

    let mut report = CanonicalReport::new(title, description).with_steps(steps);
    if let Some(notes) = input.environment_notes.as_deref().filter(|n| !n.trim().is_empty()) {
        report
            .environment
            .insert(Environment::ADDITIONAL_DETAILS, notes.trim());
    }
    report.severity = input
        .severity
        .as_deref()
        .map(Severity::coerce)
        .unwrap_or_default();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::orchestrator::tests::{ScriptedBackend, NEED_OS_JSON, REPORT_JSON};
    use crate::normalize::Normalizer;
    use bugbot_core::schema::validate;
    use bugbot_core::{Article, BackendError, ManualClock};

    struct FixedArticles;

    impl ArticleSearch for FixedArticles {
        fn search(&self, query: &str, limit: usize) -> Vec<ScoredArticle> {
            (0..5)
                .map(|i| ScoredArticle {
                    article: Article {
                        id: i.to_string(),
                        title: format!("{} help {}", query, i),
                        url: format!("https://support.example.com/{}", i),
                    },
                    score: 1.0 / (i + 1) as f64,
                })
                .take(limit)
                .collect()
        }
    }

    fn pipeline(backend: ScriptedBackend, clock: Arc<ManualClock>) -> ReportPipeline {
        let orchestrator =
            Orchestrator::new(Arc::new(backend), None, Normalizer::default(), Vec::new());
        ReportPipeline::new(Arc::new(orchestrator), Duration::minutes(30), clock)
    }

    #[tokio::test]
    async fn test_submit_caches_report_and_suggests_articles() {
        let clock = Arc::new(ManualClock::default());
        let pipeline = pipeline(ScriptedBackend::replying("ollama", REPORT_JSON), clock.clone())
            .with_article_search(Arc::new(FixedArticles));

        let submission = pipeline.submit(ReportInput::new("voice drops")).await;
        assert_eq!(submission.related_articles.len(), RELATED_ARTICLES_LIMIT);
        let GenerationOutcome::Report { id, report } = submission.outcome else {
            panic!("expected a report");
        };
        assert_eq!(pipeline.report(&id), Some(report));

        clock.advance(Duration::minutes(31));
        assert_eq!(pipeline.report(&id), None);
    }

    #[tokio::test]
    async fn test_followup_merges_answers_and_completes() {
        let clock = Arc::new(ManualClock::default());
        let backend = ScriptedBackend::new(
            "ollama",
            vec![Ok(NEED_OS_JSON.to_string()), Ok(REPORT_JSON.to_string())],
        );
        let pipeline = pipeline(backend, clock)
            .with_article_search(Arc::new(FixedArticles));

        let input = ReportInput {
            environment_notes: Some("Desktop".to_string()),
            ..ReportInput::new("voice drops")
        };
        let submission = pipeline.submit(input).await;
        assert!(submission.related_articles.is_empty());
        let GenerationOutcome::NeedMoreInfo { followup_id, fields, .. } = submission.outcome else {
            panic!("expected a follow-up");
        };
        assert_eq!(fields, vec![ReportField::Os]);

        let outcome = pipeline
            .submit_followup(&followup_id, &[(ReportField::Os, "Windows 11".to_string())])
            .await;
        assert!(outcome.is_report());
        assert!(pipeline.pending_followup(&followup_id).is_none());
    }

    #[tokio::test]
    async fn test_renewed_insufficiency_keeps_merged_input() {
        let clock = Arc::new(ManualClock::default());
        let backend = ScriptedBackend::new(
            "ollama",
            vec![
                Ok(NEED_OS_JSON.to_string()),
                Ok(r#"{"needMoreInfo": true, "missingFields": ["appVersion"]}"#.to_string()),
            ],
        );
        let pipeline = pipeline(backend, clock);

        let GenerationOutcome::NeedMoreInfo { followup_id, .. } =
            pipeline.submit(ReportInput::new("voice drops")).await.outcome
        else {
            panic!("expected a follow-up");
        };
        let outcome = pipeline
            .submit_followup(&followup_id, &[(ReportField::Os, "Windows 11".to_string())])
            .await;
        match outcome {
            GenerationOutcome::NeedMoreInfo { followup_id: again, fields, .. } => {
                assert_eq!(again, followup_id);
                assert_eq!(fields, vec![ReportField::AppVersion]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        let pending = pipeline.pending_followup(&followup_id).unwrap();
        assert_eq!(
            pending.input.environment_notes.as_deref(),
            Some("operating system and version: Windows 11")
        );
    }

    #[tokio::test]
    async fn test_generate_anyway_builds_report_when_backend_insists() {
        let clock = Arc::new(ManualClock::default());
        let pipeline = pipeline(ScriptedBackend::replying("ollama", NEED_OS_JSON), clock);
        let input = ReportInput {
            detailed_description: Some("Audio cuts out".to_string()),
            steps: vec!["Join voice".to_string()],
            severity: Some("high".to_string()),
            ..ReportInput::new("voice drops")
        };
        let GenerationOutcome::NeedMoreInfo { followup_id, .. } = pipeline.submit(input).await.outcome
        else {
            panic!("expected a follow-up");
        };

        match pipeline.generate_anyway(&followup_id).await {
            GenerationOutcome::Report { report, .. } => {
                assert_eq!(report.title, "voice drops");
                assert_eq!(report.description, "Audio cuts out");
                assert_eq!(report.severity, Severity::High);
                assert!(validate(&report).is_ok());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(pipeline.pending_followup(&followup_id).is_none());
    }

    #[tokio::test]
    async fn test_unknown_followup_is_expired() {
        let clock = Arc::new(ManualClock::default());
        let pipeline = pipeline(ScriptedBackend::replying("ollama", REPORT_JSON), clock);
        match pipeline.submit_followup("nope", &[]).await {
            GenerationOutcome::Fatal { message } => assert_eq!(message, FOLLOWUP_EXPIRED_MESSAGE),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_infrastructure_failure_is_fatal_with_generic_message() {
        let clock = Arc::new(ManualClock::default());
        let pipeline = pipeline(
            ScriptedBackend::failing("ollama", BackendError::Network("refused".into())),
            clock,
        );
        match pipeline.submit(ReportInput::new("voice drops")).await.outcome {
            GenerationOutcome::Fatal { message } => {
                assert!(!message.contains("refused"));
                assert!(message.contains("try again"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_best_effort_report_defaults() {
        let report = best_effort_report(&ReportInput::new("   "));
        assert_eq!(report.title, DEFAULT_TITLE);
        assert_eq!(report.description, DEFAULT_DESCRIPTION);
        assert_eq!(report.steps_to_reproduce, vec![PLACEHOLDER_STEP]);
        assert!(validate(&report).is_ok());
    }

    #[test]
    fn test_best_effort_report_skips_placeholders_and_sentinel() {
        let report = best_effort_report(&ReportInput {
            detailed_description: Some("null".to_string()),
            ..ReportInput::new("NEED_MORE_INFO")
        });
        assert_eq!(report.title, DEFAULT_TITLE);
        assert_eq!(report.description, DEFAULT_DESCRIPTION);
        assert!(validate(&report).is_ok());

        let report = best_effort_report(&ReportInput::new("Voice drops, need_more_info here"));
        assert!(!report.title.to_ascii_uppercase().contains("NEED_MORE_INFO"));
        assert!(report.title.starts_with("Voice drops"));
        assert!(validate(&report).is_ok());
    }
}
