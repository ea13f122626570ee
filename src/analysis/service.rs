//! Analysis service coordinating upload, indexing, thread, run, and reply extraction.

use crate::{
    analysis::{
        prompts::{
            ASSISTANT_INSTRUCTIONS, CHAT_MAX_TOKENS, CHAT_SYSTEM_PROMPT, CHAT_TEMPERATURE,
            SUMMARY_REQUEST, UPLOAD_PURPOSE,
        },
        session::{AssistantSession, Session},
        types::{AnalysisError, ChatAnalysis, PdfUpload},
    },
    config::{Config, RunScope},
    metrics::AnalysisMetrics,
    openai::{
        ChatCompletionRequest, OpenAiError, PollPolicy, Run, RunStatus, VectorStoreFile,
        VectorStoreFileStatus, poll_until,
    },
};
use async_trait::async_trait;
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

/// Turns uploaded PDFs into generated summaries through the OpenAI Assistants API.
///
/// The service owns the one-time [`AssistantSession`] and the metrics registry, so every HTTP
/// route reuses the same vector store and assistant. Construct it once near process start and
/// share it through an `Arc`.
pub struct AnalysisService {
    session: AssistantSession,
    run_scope: RunScope,
    chat_model: String,
    poll_policy: PollPolicy,
    metrics: AnalysisMetrics,
}

/// Abstraction over the analysis pipeline used by the HTTP surface.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Upload, index, and summarize a PDF through the assistant; returns the reply text verbatim.
    async fn summarize_pdf(&self, upload: PdfUpload) -> Result<String, AnalysisError>;

    /// Upload a PDF and analyze it with a single chat completion.
    async fn analyze_with_chat(&self, upload: PdfUpload) -> Result<ChatAnalysis, AnalysisError>;

    /// Counters shared with the HTTP layer.
    fn metrics(&self) -> &AnalysisMetrics;
}

impl AnalysisService {
    /// Build the service without contacting the provider.
    pub fn new(config: Config) -> Self {
        let poll_policy = PollPolicy {
            interval: config.poll_interval(),
            timeout: config.poll_timeout(),
        };
        Self {
            run_scope: config.run_scope,
            chat_model: config.assistant_model.clone(),
            poll_policy,
            session: AssistantSession::new(config),
            metrics: AnalysisMetrics::new(),
        }
    }

    /// Bootstrap the shared session now instead of on the first request.
    pub async fn warm_up(&self) -> Result<(), AnalysisError> {
        let session = self.session.get().await?;
        tracing::info!(
            vector_store_id = %session.vector_store.id,
            assistant_id = %session.assistant.id,
            "Assistant session ready"
        );
        Ok(())
    }

    /// Whether the shared session has been bootstrapped.
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Upload, index, and summarize a PDF through the assistant.
    pub async fn summarize_pdf(&self, upload: PdfUpload) -> Result<String, AnalysisError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("summarize_pdf", %request_id, file_name = %upload.file_name);
        async move {
            tracing::info!(size = upload.bytes.len(), sha256 = %upload.digest(), "Analyzing PDF");
            let session = self.session.get().await?;
            let summary = self.run_assistant(session, upload).await?;
            tracing::info!(chars = summary.chars().count(), "Summary generated");
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Upload a PDF and analyze it with a single chat completion.
    pub async fn analyze_with_chat(
        &self,
        upload: PdfUpload,
    ) -> Result<ChatAnalysis, AnalysisError> {
        let request_id = Uuid::new_v4();
        let span =
            tracing::info_span!("analyze_with_chat", %request_id, file_name = %upload.file_name);
        async move {
            tracing::info!(size = upload.bytes.len(), sha256 = %upload.digest(), "Analyzing PDF via chat completion");
            let client = self.session.client().await?;

            let file = client
                .upload_file(&upload.file_name, upload.bytes, UPLOAD_PURPOSE)
                .await?;

            let request = ChatCompletionRequest {
                model: self.chat_model.clone(),
                messages: vec![
                    json!({ "role": "system", "content": CHAT_SYSTEM_PROMPT }),
                    json!({
                        "role": "user",
                        "content": [
                            { "type": "text", "text": ASSISTANT_INSTRUCTIONS },
                            { "type": "file", "file": { "file_id": file.id } }
                        ]
                    }),
                ],
                max_tokens: CHAT_MAX_TOKENS,
                temperature: CHAT_TEMPERATURE,
            };
            let completion = client.create_chat_completion(&request).await?;
            let analysis = completion
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .map(|content| content.trim().to_string())
                .filter(|content| !content.is_empty())
                .ok_or_else(|| OpenAiError::InvalidResponse {
                    endpoint: "chat/completions".to_string(),
                    message: "completion contained no text".to_string(),
                })?;

            tracing::info!(file_id = %file.id, chars = analysis.chars().count(), "Chat analysis generated");
            Ok(ChatAnalysis {
                file_id: file.id,
                analysis,
            })
        }
        .instrument(span)
        .await
    }

    async fn run_assistant(
        &self,
        session: &Session,
        upload: PdfUpload,
    ) -> Result<String, AnalysisError> {
        let client = &session.client;
        let vector_store_id = session.vector_store.id.as_str();

        let file = client
            .upload_file(&upload.file_name, upload.bytes, UPLOAD_PURPOSE)
            .await?;
        let file_id = file.id.as_str();
        tracing::debug!(file_id, "Uploaded PDF");

        client.attach_file(vector_store_id, file_id).await?;
        let indexed = poll_until(
            "vector store indexing",
            self.poll_policy,
            move || client.retrieve_vector_store_file(vector_store_id, file_id),
            |file: &VectorStoreFile| file.status.is_terminal(),
        )
        .await?;
        if indexed.status != VectorStoreFileStatus::Completed {
            return Err(OpenAiError::IndexingFailed {
                file_id: file_id.to_string(),
                status: indexed.status.as_str().to_string(),
                message: indexed
                    .last_error
                    .map(|error| error.message)
                    .unwrap_or_else(|| "no details provided".to_string()),
            }
            .into());
        }
        tracing::debug!(file_id, vector_store_id, "File indexed");

        let thread = client.create_thread().await?;
        let thread_id = thread.id.as_str();
        let scoped = [file_id];
        let attachments: &[&str] = match self.run_scope {
            RunScope::Store => &[],
            RunScope::File => &scoped,
        };
        client
            .create_user_message(thread_id, SUMMARY_REQUEST, attachments)
            .await?;

        let run = client
            .create_run(thread_id, &session.assistant.id)
            .await?;
        let run_id = run.id.as_str();
        tracing::debug!(thread_id, run_id, scope = ?self.run_scope, "Run started");

        let finished = poll_until(
            "assistant run",
            self.poll_policy,
            move || client.retrieve_run(thread_id, run_id),
            |run: &Run| run.status.is_terminal(),
        )
        .await?;
        if finished.status != RunStatus::Completed {
            return Err(OpenAiError::RunFailed {
                run_id: run_id.to_string(),
                status: finished.status.as_str().to_string(),
                message: finished.failure_reason(),
            }
            .into());
        }

        let reply = client.latest_message(thread_id).await?;
        reply
            .filter(|message| message.role == "assistant")
            .and_then(|message| message.first_text().map(str::to_string))
            .ok_or_else(|| AnalysisError::EmptyReply {
                thread_id: thread_id.to_string(),
            })
    }
}

#[async_trait]
impl AnalysisApi for AnalysisService {
    async fn summarize_pdf(&self, upload: PdfUpload) -> Result<String, AnalysisError> {
        AnalysisService::summarize_pdf(self, upload).await
    }

    async fn analyze_with_chat(&self, upload: PdfUpload) -> Result<ChatAnalysis, AnalysisError> {
        AnalysisService::analyze_with_chat(self, upload).await
    }

    fn metrics(&self) -> &AnalysisMetrics {
        &self.metrics
    }
}
