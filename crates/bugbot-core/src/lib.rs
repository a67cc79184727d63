//! Core domain model and contracts for BugBot.

pub mod clock;
pub mod error;
pub mod field;
pub mod protocol;
pub mod report;
pub mod schema;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BackendError, InsufficiencySignal, PipelineError};
pub use field::ReportField;
pub use protocol::*;
pub use report::{CanonicalReport, Environment, ReportInput, Severity};
