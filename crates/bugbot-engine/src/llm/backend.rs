//! The contract every text-generation backend implements, plus the HTTP
//! helpers the concrete backends share.

use crate::util::truncate_str;
use bugbot_core::BackendError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Maximum length for response bodies quoted in errors and logs
const MAX_ERROR_CONTENT_LEN: usize = 200;

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<String, BackendError>> + Send + 'a>>;

/// Sampling settings for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl GenerateOptions {
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// A backend turns a compiled prompt into raw generated text.
///
/// Only transport-level failures are errors here. Whatever text comes back,
/// however malformed, is returned as `Ok` for the normalizer to deal with.
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Options this backend was configured with (model, timeout, sampling).
    fn default_options(&self) -> GenerateOptions;

    fn generate<'a>(&'a self, prompt: &'a str, options: &'a GenerateOptions)
        -> BackendFuture<'a>;
}

/// Sanitize API response content for error messages to prevent credential leakage.
pub(crate) fn sanitize_api_response(content: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "api_key",
        "apikey",
        "secret",
        "password",
        "credential",
        "bearer",
        "sk-",
    ];

    let truncated = truncate_str(content, MAX_ERROR_CONTENT_LEN);

    let lower = truncated.to_lowercase();
    for pattern in SECRET_PATTERNS {
        if lower.contains(pattern) {
            return "(response details redacted - may contain sensitive data)".to_string();
        }
    }

    truncated.to_string()
}

/// Create a configured HTTP client for backend requests
pub(crate) fn create_http_client(timeout: Duration) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BackendError::Network(format!("failed to create HTTP client: {}", e)))
}

pub(crate) fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    } else if err.is_decode() {
        BackendError::Decode(err.to_string())
    } else {
        BackendError::Network(err.to_string())
    }
}

/// Read the body of a response, turning non-2xx statuses into [`BackendError::Status`].
pub(crate) async fn read_success_body(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<String, BackendError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| map_reqwest_error(e, timeout))?;
    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            body: sanitize_api_response(&text),
        });
    }
    Ok(text)
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
