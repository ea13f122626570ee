//! Shared types used by the OpenAI client and polling helpers.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors returned while interacting with the OpenAI REST API.
#[derive(Debug, Error)]
pub enum OpenAiError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid OpenAI URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a complete response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// OpenAI responded with a non-success status code.
    #[error("Unexpected OpenAI response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the API.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Response body did not match the expected shape.
    #[error("Malformed OpenAI response from {endpoint}: {message}")]
    InvalidResponse {
        /// Endpoint that produced the body.
        endpoint: String,
        /// Deserializer diagnostic.
        message: String,
    },
    /// Vector store indexing ended in a non-completed state.
    #[error("Indexing of file {file_id} ended with status {status}: {message}")]
    IndexingFailed {
        /// Uploaded file that failed to index.
        file_id: String,
        /// Terminal status reported by the API.
        status: String,
        /// Provider-supplied reason, if any.
        message: String,
    },
    /// Assistant run ended in a non-completed state.
    #[error("Run {run_id} ended with status {status}: {message}")]
    RunFailed {
        /// Identifier of the failed run.
        run_id: String,
        /// Terminal status reported by the API.
        status: String,
        /// Provider-supplied reason, if any.
        message: String,
    },
    /// A wait-until-terminal loop exceeded its deadline.
    #[error("Timed out after {}s waiting for {resource}", .waited.as_secs())]
    PollTimeout {
        /// Human-readable name of the polled resource.
        resource: String,
        /// Deadline that elapsed.
        waited: Duration,
    },
}

impl OpenAiError {
    /// Whether retrying the same call later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::PollTimeout { .. } => true,
            Self::UnexpectedStatus { status, .. } => {
                status.is_server_error()
                    || matches!(
                        *status,
                        StatusCode::REQUEST_TIMEOUT
                            | StatusCode::CONFLICT
                            | StatusCode::TOO_MANY_REQUESTS
                    )
            }
            Self::InvalidUrl(_)
            | Self::InvalidResponse { .. }
            | Self::IndexingFailed { .. }
            | Self::RunFailed { .. } => false,
        }
    }
}

/// Error detail attached to failed files and runs.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub message: String,
}

/// File stored through `POST /files`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    /// Opaque file identifier.
    pub id: String,
    /// Name recorded by the provider.
    #[serde(default)]
    pub filename: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub bytes: Option<u64>,
}

/// Provider-managed semantic index.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStore {
    /// Opaque vector store identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Lifecycle status (`in_progress`, `completed`, `expired`).
    #[serde(default)]
    pub status: Option<String>,
}

/// Indexing state of a file attached to a vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreFileStatus {
    /// Indexing is still running.
    InProgress,
    /// File is searchable.
    Completed,
    /// Indexing was cancelled.
    Cancelled,
    /// Indexing failed; see `last_error`.
    Failed,
    /// Status introduced after this client was written.
    #[serde(other)]
    Unknown,
}

impl VectorStoreFileStatus {
    /// Whether polling can stop.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

/// Association between a vector store and an uploaded file.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreFile {
    /// Identifier of the attached file.
    pub id: String,
    /// Current indexing status.
    pub status: VectorStoreFileStatus,
    /// Failure reason when `status` is `failed`.
    #[serde(default)]
    pub last_error: Option<ApiErrorDetail>,
}

/// Provider-managed assistant configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Assistant {
    /// Opaque assistant identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Model bound to the assistant.
    #[serde(default)]
    pub model: String,
    /// Tool resources, including bound vector stores.
    #[serde(default)]
    pub tool_resources: Option<Value>,
}

impl Assistant {
    /// Whether the assistant's file search tool is bound to the given vector store.
    pub fn searches_vector_store(&self, vector_store_id: &str) -> bool {
        self.tool_resources
            .as_ref()
            .and_then(|resources| resources.pointer("/file_search/vector_store_ids"))
            .and_then(Value::as_array)
            .is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(vector_store_id)))
    }
}

/// Parameters for `POST /assistants`.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantSpec {
    /// Display name.
    pub name: String,
    /// Model identifier.
    pub model: String,
    /// System instructions.
    pub instructions: String,
    /// Vector store searched by the file search tool.
    pub vector_store_id: String,
}

/// Provider-managed conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    /// Opaque thread identifier.
    pub id: String,
}

/// A message within a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Opaque message identifier.
    pub id: String,
    /// Author role (`user` or `assistant`).
    pub role: String,
    /// Ordered content blocks.
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Text of the first content block, when that block is text.
    pub fn first_text(&self) -> Option<&str> {
        match self.content.first()? {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        }
    }
}

/// One content block of a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text with optional annotations.
    Text {
        /// Text payload.
        text: TextContent,
    },
    /// Image or other non-text block.
    #[serde(other)]
    Other,
}

/// Text payload of a message content block.
#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    /// Generated text.
    pub value: String,
}

#[derive(Deserialize)]
pub(crate) struct MessageList {
    #[serde(default)]
    pub(crate) data: Vec<Message>,
}

/// Execution state of an assistant run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting to start.
    Queued,
    /// Model is working.
    InProgress,
    /// Run is waiting on tool outputs this service never supplies.
    RequiresAction,
    /// Cancellation requested.
    Cancelling,
    /// Run was cancelled.
    Cancelled,
    /// Run failed; see `last_error`.
    Failed,
    /// Run finished and produced messages.
    Completed,
    /// Run stopped early, e.g. on a token limit.
    Incomplete,
    /// Run exceeded the provider's deadline.
    Expired,
    /// Status introduced after this client was written.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether polling can stop. `requires_action` counts as terminal because no tool outputs
    /// are ever submitted.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::InProgress | Self::Cancelling)
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

/// One execution of an assistant against a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    /// Opaque run identifier.
    pub id: String,
    /// Current execution state.
    pub status: RunStatus,
    /// Failure reason when `status` is `failed`.
    #[serde(default)]
    pub last_error: Option<ApiErrorDetail>,
    /// Reason when `status` is `incomplete`.
    #[serde(default)]
    pub incomplete_details: Option<Value>,
}

impl Run {
    /// Best available explanation for a non-completed terminal state.
    pub fn failure_reason(&self) -> String {
        if let Some(error) = &self.last_error {
            return match &error.code {
                Some(code) => format!("{code}: {}", error.message),
                None => error.message.clone(),
            };
        }
        self.incomplete_details
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "no details provided".to_string())
    }
}

/// Request for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<Value>,
    /// Output token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Response from `POST /chat/completions`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    /// Candidate completions; only the first is used.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// One completion candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// Generated assistant message.
    pub message: ChatMessage,
}

/// Assistant message inside a completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    /// Generated text; absent on refusals or tool calls.
    #[serde(default)]
    pub content: Option<String>,
}
