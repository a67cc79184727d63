use super::backend::{
    create_http_client, endpoint, map_reqwest_error, read_success_body, sanitize_api_response,
    BackendFuture, GenerateOptions, GenerationBackend,
};
use bugbot_core::{BackendError, PipelineError};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct SamplingOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Local Ollama server using the non-streaming `/api/generate` endpoint.
pub struct OllamaBackend {
    base_url: String,
    options: GenerateOptions,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub const NAME: &'static str = "ollama";

    pub fn new(base_url: impl Into<String>, options: GenerateOptions) -> Result<Self, PipelineError> {
        let client = create_http_client(options.timeout)
            .map_err(|e| PipelineError::configuration(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            options,
            client,
        })
    }

    async fn call(&self, prompt: &str, options: &GenerateOptions) -> Result<String, BackendError> {
        let request = GenerateRequest {
            model: &options.model,
            prompt,
            stream: false,
            options: SamplingOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, options.timeout))?;
        let text = read_success_body(response, options.timeout).await?;

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| {
            BackendError::Decode(format!("{} ({})", e, sanitize_api_response(&text)))
        })?;
        match parsed.response {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(BackendError::EmptyResponse),
        }
    }
}

impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_options(&self) -> GenerateOptions {
        self.options.clone()
    }

    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
    ) -> BackendFuture<'a> {
        Box::pin(self.call(prompt, options))
    }
}
