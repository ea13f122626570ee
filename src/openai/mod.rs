//! OpenAI Assistants API integration.

pub mod client;
pub mod poll;
pub mod types;

pub use client::OpenAiClient;
pub use poll::{PollPolicy, Polled, poll_until};
pub use types::{
    Assistant, AssistantSpec, ChatCompletion, ChatCompletionRequest, FileObject, Message,
    OpenAiError, Run, RunStatus, Thread, VectorStore, VectorStoreFile, VectorStoreFileStatus,
};
