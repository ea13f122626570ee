//! PDF analysis pipeline: session bootstrap, upload, indexing, and run orchestration.

pub mod prompts;
mod service;
pub mod session;
pub mod types;

pub use service::{AnalysisApi, AnalysisService};
pub use session::{AssistantSession, Session};
pub use types::{AnalysisError, ChatAnalysis, ErrorKind, PdfUpload};
