//! Backend orchestration: one attempt on the preferred backend, at most one on
//! the alternate, and only when the first failure was transport-level.

use super::backend::{GenerateOptions, GenerationBackend};
use super::ollama::OllamaBackend;
use super::openai::OpenAiBackend;
use super::prompts;
use crate::config::{BackendKind, Config};
use crate::normalize::Normalizer;
use bugbot_core::{
    BackendError, CanonicalReport, ExampleSource, InsufficiencySignal, PipelineError, ReportInput,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Why a single attempt did not produce a report.
enum AttemptFailure {
    /// The backend answered; its answer was "not enough information".
    Insufficient(InsufficiencySignal),
    Transport(PipelineError),
}

pub struct Orchestrator {
    preferred: Arc<dyn GenerationBackend>,
    alternate: Option<Arc<dyn GenerationBackend>>,
    normalizer: Normalizer,
    examples: Vec<CanonicalReport>,
}

impl Orchestrator {
    pub fn new(
        preferred: Arc<dyn GenerationBackend>,
        alternate: Option<Arc<dyn GenerationBackend>>,
        normalizer: Normalizer,
        mut examples: Vec<CanonicalReport>,
    ) -> Self {
        examples.truncate(prompts::MAX_EXAMPLES);
        Self {
            preferred,
            alternate,
            normalizer,
            examples,
        }
    }

    /// Wire backends from configuration. The alternate is OpenAI only when a key
    /// is configured; Ollama is always available as the alternate.
    pub fn from_config(config: &Config, examples: &dyn ExampleSource) -> Result<Self, PipelineError> {
        config.validate()?;
        let preferred = build_backend(config.backend, config)?;
        let alternate = match config.alternate_backend() {
            Some(kind) => Some(build_backend(kind, config)?),
            None => None,
        };
        tracing::info!(
            preferred = preferred.name(),
            alternate = alternate.as_ref().map(|b| b.name()).unwrap_or("none"),
            "generation backends configured"
        );
        Ok(Self::new(
            preferred,
            alternate,
            Normalizer::new(config.known_components.clone()),
            examples.examples(prompts::MAX_EXAMPLES),
        ))
    }

    pub fn preferred_name(&self) -> &str {
        self.preferred.name()
    }

    pub fn alternate_name(&self) -> Option<&str> {
        self.alternate.as_ref().map(|b| b.name())
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Generate a report for `input`.
    ///
    /// Insufficiency from either backend is returned immediately. When both
    /// backends fail at the transport level the preferred backend's error is
    /// returned.
    pub async fn generate(&self, input: &ReportInput) -> Result<CanonicalReport, PipelineError> {
        let prompt = prompts::compile(input, &self.examples);

        let first = match self.attempt(self.preferred.as_ref(), &prompt).await {
            Ok(report) => return Ok(report),
            Err(AttemptFailure::Insufficient(signal)) => return Err(signal.into()),
            Err(AttemptFailure::Transport(err)) => err,
        };

        let Some(alternate) = self.alternate.as_ref() else {
            tracing::error!(error = %first, "generation failed and no alternate backend is configured");
            return Err(first);
        };
        tracing::warn!(
            error = %first,
            alternate = alternate.name(),
            "preferred backend failed; trying alternate"
        );

        match self.attempt(alternate.as_ref(), &prompt).await {
            Ok(report) => Ok(report),
            Err(AttemptFailure::Insufficient(signal)) => Err(signal.into()),
            Err(AttemptFailure::Transport(second)) => {
                tracing::error!(first = %first, second = %second, "all generation backends failed");
                Err(first)
            }
        }
    }

    async fn attempt(
        &self,
        backend: &dyn GenerationBackend,
        prompt: &str,
    ) -> Result<CanonicalReport, AttemptFailure> {
        let options = backend.default_options();
        let started = Instant::now();
        let raw = match timeout(options.timeout, backend.generate(prompt, &options)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                return Err(AttemptFailure::Transport(PipelineError::infrastructure(
                    backend.name(),
                    err,
                )))
            }
            Err(_) => {
                return Err(AttemptFailure::Transport(PipelineError::infrastructure(
                    backend.name(),
                    BackendError::Timeout(options.timeout_ms()),
                )))
            }
        };
        tracing::info!(
            backend = backend.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = raw.len(),
            "received backend response"
        );
        self.normalizer
            .normalize(&raw)
            .map_err(AttemptFailure::Insufficient)
    }
}

fn build_backend(
    kind: BackendKind,
    config: &Config,
) -> Result<Arc<dyn GenerationBackend>, PipelineError> {
    let options = |model: &str, timeout_secs: u64| GenerateOptions {
        model: model.to_string(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout: Duration::from_secs(timeout_secs),
    };
    Ok(match kind {
        BackendKind::Ollama => Arc::new(OllamaBackend::new(
            config.ollama_base_url.clone(),
            options(&config.ollama_model, config.ollama_timeout_secs),
        )?),
        BackendKind::OpenAi => Arc::new(OpenAiBackend::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            options(&config.openai_model, config.openai_timeout_secs),
        )?),
    })
}
