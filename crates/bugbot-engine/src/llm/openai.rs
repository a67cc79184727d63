use super::backend::{
    create_http_client, endpoint, map_reqwest_error, read_success_body, sanitize_api_response,
    BackendFuture, GenerateOptions, GenerationBackend,
};
use bugbot_core::{BackendError, PipelineError};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions endpoint.
pub struct OpenAiBackend {
    base_url: String,
    api_key: String,
    options: GenerateOptions,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub const NAME: &'static str = "openai";

    /// Fails with a configuration error when no API key is available.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        options: GenerateOptions,
    ) -> Result<Self, PipelineError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PipelineError::configuration("OPENAI_API_KEY is not configured"))?;
        let client = create_http_client(options.timeout)
            .map_err(|e| PipelineError::configuration(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key,
            options,
            client,
        })
    }

    async fn call(&self, prompt: &str, options: &GenerateOptions) -> Result<String, BackendError> {
        let request = ChatRequest {
            model: &options.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, options.timeout))?;
        let text = read_success_body(response, options.timeout).await?;

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            BackendError::Decode(format!("{} ({})", e, sanitize_api_response(&text)))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        Ok(content)
    }
}

impl GenerationBackend for OpenAiBackend {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> GenerateOptions {
        GenerateOptions {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 800,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let err = OpenAiBackend::new("https://api.openai.com/v1", None, options())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(OpenAiBackend::new("https://api.openai.com/v1", Some("  ".into()), options()).is_err());
    }

    #[tokio::test]
    async fn test_generate_sends_bearer_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 800,
                "messages": [{ "role": "user", "content": "hello" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "report text" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(
            format!("{}/v1", server.uri()),
            Some("sk-test".to_string()),
            options(),
        )
        .unwrap();
        let text = backend.generate("hello", &options()).await.unwrap();
        assert_eq!(text, "report text");
    }

    #[tokio::test]
    async fn test_unauthorized_body_is_redacted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string("Incorrect API key provided: sk-test"),
            )
            .mount(&server)
            .await;

        let backend =
            OpenAiBackend::new(server.uri(), Some("sk-test".to_string()), options()).unwrap();
        match backend.generate("hello", &options()).await.unwrap_err() {
            BackendError::Status { status, body } => {
                assert_eq!(status, 401);
                assert!(!body.contains("sk-test"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let backend =
            OpenAiBackend::new(server.uri(), Some("sk-test".to_string()), options()).unwrap();
        let err = backend.generate("hello", &options()).await.unwrap_err();
        assert_eq!(err, BackendError::EmptyResponse);
    }
}
