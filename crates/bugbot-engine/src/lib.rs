//! Report synthesis engine: prompt compilation, backend orchestration,
//! response normalization and the conversational slot-filling session.

pub mod llm;
pub mod normalize;
pub mod pipeline;
pub mod session;
pub mod store;

pub mod config {
    pub use bugbot_adapters::config::*;
}

pub mod util {
    pub use bugbot_adapters::util::*;
}

pub use llm::{GenerateOptions, GenerationBackend, Orchestrator};
pub use normalize::Normalizer;
pub use pipeline::{PendingFollowup, ReportPipeline, Submission};
pub use session::{MessageOutcome, SessionManager, SessionReply, SessionStep};
pub use store::ExpiringStore;
