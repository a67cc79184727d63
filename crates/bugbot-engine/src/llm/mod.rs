pub mod backend;
pub mod ollama;
pub mod openai;
pub mod orchestrator;
pub mod prompts;

pub use backend::{BackendFuture, GenerateOptions, GenerationBackend};
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use orchestrator::Orchestrator;
