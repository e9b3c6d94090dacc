pub mod completion;
pub mod expectation;
pub mod ids;
pub mod report;
pub mod shell;
pub mod suite;

pub use completion::*;
pub use expectation::*;
pub use ids::{RunId, SessionId};
pub use report::*;
pub use shell::*;
pub use suite::*;

/// Version stamped into serialized suite reports.
pub const REPORT_VERSION: u32 = 1;

/// Placeholder replaced by the session context name in probe inputs,
/// expectations and prompt templates.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";
