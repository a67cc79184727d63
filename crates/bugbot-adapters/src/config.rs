//! Configuration management for bugbot
//!
//! Defaults, then `~/.config/bugbot/config.toml`, then environment variables.

use bugbot_core::PipelineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";
pub const DEFAULT_OLLAMA_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_TOKENS: u32 = 800;
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_EXAMPLES_PATH: &str = "data/bug_reports.jsonl";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
/// Longest idle time a session or cached report may be kept.
pub const MAX_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::OpenAi => "openai",
        }
    }

    pub fn parse(raw: &str) -> Option<BackendKind> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(BackendKind::Ollama),
            "openai" => Some(BackendKind::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub ollama_timeout_secs: u64,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub known_components: Vec<String>,
    pub examples_path: PathBuf,
    pub session_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ollama,
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            ollama_timeout_secs: DEFAULT_OLLAMA_TIMEOUT_SECS,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_timeout_secs: DEFAULT_OPENAI_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            known_components: Vec::new(),
            examples_path: PathBuf::from(DEFAULT_EXAMPLES_PATH),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl Config {
    fn sanitize(&mut self) {
        self.openai_api_key = self
            .openai_api_key
            .take()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self.known_components = self
            .known_components
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            self.temperature = DEFAULT_TEMPERATURE;
        }
        if self.max_tokens == 0 {
            self.max_tokens = DEFAULT_MAX_TOKENS;
        }
        if self.session_ttl_secs == 0 {
            self.session_ttl_secs = DEFAULT_SESSION_TTL_SECS;
        }
        self.session_ttl_secs = self.session_ttl_secs.min(MAX_SESSION_TTL_SECS);
    }

    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("bugbot"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    /// Load from the user config file and the process environment.
    pub fn load() -> Self {
        Self::load_from(Self::config_path().as_deref(), |key| std::env::var(key).ok())
    }

    /// Load from an explicit file (if any) and an environment lookup.
    pub fn load_from<F>(path: Option<&Path>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = path.map(Self::read_file).unwrap_or_default();
        config.apply_env(env);
        config.sanitize();
        config
    }

    fn read_file(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(err) => {
                preserve_corrupt_config(path, &content);
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "config file was corrupted; a backup was saved and defaults were loaded"
                );
                Self::default()
            }
        }
    }

    /// Overlay environment variables onto the current values.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            env(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(raw) = get("AI_BACKEND") {
            match BackendKind::parse(&raw) {
                Some(kind) => self.backend = kind,
                None => tracing::warn!(value = %raw, "unknown AI_BACKEND; keeping {}", self.backend.as_str()),
            }
        }
        if let Some(v) = get("OLLAMA_BASE_URL") {
            self.ollama_base_url = v;
        }
        if let Some(v) = get("OLLAMA_MODEL") {
            self.ollama_model = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai_base_url = v;
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.openai_model = v;
        }
        if let Some(v) = get("OLLAMA_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.ollama_timeout_secs = v;
        }
        if let Some(v) = get("OPENAI_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.openai_timeout_secs = v;
        }
        if let Some(v) = get("BUGBOT_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.max_tokens = v;
        }
        if let Some(v) = get("BUGBOT_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.temperature = v;
        }
        if let Some(v) = get("BUGBOT_KNOWN_COMPONENTS") {
            self.known_components = v.split(',').map(|c| c.trim().to_string()).collect();
        }
        if let Some(v) = get("BUGBOT_EXAMPLES_PATH") {
            self.examples_path = PathBuf::from(v);
        }
        if let Some(v) = get("BUGBOT_SESSION_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.session_ttl_secs = v;
        }
    }

    pub fn has_openai_key(&self) -> bool {
        self.openai_api_key.is_some()
    }

    /// Reject settings the orchestrator cannot be built from.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.backend == BackendKind::OpenAi && !self.has_openai_key() {
            return Err(PipelineError::configuration(
                "AI_BACKEND is openai but OPENAI_API_KEY is not set",
            ));
        }
        validate_base_url("OLLAMA_BASE_URL", &self.ollama_base_url)?;
        validate_base_url("OPENAI_BASE_URL", &self.openai_base_url)?;
        Ok(())
    }

    /// The backend tried after a transport failure of the preferred one, if any.
    pub fn alternate_backend(&self) -> Option<BackendKind> {
        match self.backend {
            BackendKind::Ollama => self.has_openai_key().then_some(BackendKind::OpenAi),
            BackendKind::OpenAi => Some(BackendKind::Ollama),
        }
    }

    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/bugbot/config.toml".to_string())
    }
}

fn validate_base_url(name: &str, raw: &str) -> Result<(), PipelineError> {
    let url = Url::parse(raw)
        .map_err(|e| PipelineError::configuration(format!("{} is not a valid URL: {}", name, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PipelineError::configuration(format!(
            "{} must use http or https",
            name
        )));
    }
    Ok(())
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("toml.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Ollama);
        assert_eq!(config.ollama_timeout_secs, 300);
        assert_eq!(config.openai_timeout_secs, 60);
        assert_eq!(config.session_ttl_secs, 1800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "backend = \"ollama\"\nollama_model = \"mistral\"\nmax_tokens = 500\n",
        )
        .unwrap();

        let config = Config::load_from(
            Some(&path),
            env_of(&[
                ("AI_BACKEND", "openai"),
                ("OPENAI_API_KEY", "sk-test"),
                ("BUGBOT_KNOWN_COMPONENTS", "Voice, Chat ,,Login"),
            ]),
        );
        assert_eq!(config.backend, BackendKind::OpenAi);
        assert_eq!(config.ollama_model, "mistral");
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.known_components, vec!["Voice", "Chat", "Login"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_ttl_is_clamped() {
        let max = u64::MAX.to_string();
        let config = Config::load_from(None, env_of(&[("BUGBOT_SESSION_TTL_SECS", max.as_str())]));
        assert_eq!(config.session_ttl_secs, MAX_SESSION_TTL_SECS);

        let config = Config::load_from(None, env_of(&[("BUGBOT_SESSION_TTL_SECS", "0")]));
        assert_eq!(config.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
    }

    #[test]
    fn test_corrupt_file_is_preserved_and_defaults_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "backend = [not toml").unwrap();

        let config = Config::load_from(Some(&path), env_of(&[]));
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.toml.corrupt").exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_openai_without_key_is_configuration_error() {
        let config = Config::load_from(None, env_of(&[("AI_BACKEND", "openai")]));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let config = Config::load_from(None, env_of(&[("OLLAMA_BASE_URL", "ftp://host")]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_alternate_backend_selection() {
        let mut config = Config::default();
        assert_eq!(config.alternate_backend(), None);
        config.openai_api_key = Some("sk-x".to_string());
        assert_eq!(config.alternate_backend(), Some(BackendKind::OpenAi));
        config.backend = BackendKind::OpenAi;
        assert_eq!(config.alternate_backend(), Some(BackendKind::Ollama));
    }

    #[test]
    fn test_api_key_never_serialized() {
        let config = Config {
            openai_api_key: Some("sk-secret".to_string()),
            ..Config::default()
        };
        let encoded = toml::to_string(&config).unwrap();
        assert!(!encoded.contains("sk-secret"));
    }
}
