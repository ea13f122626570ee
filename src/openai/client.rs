//! HTTP client wrapper for the OpenAI files, vector store, assistant and chat endpoints.

use crate::openai::poll::{Polled, retry_after};
use crate::openai::types::{
    Assistant, AssistantSpec, ChatCompletion, ChatCompletionRequest, FileObject, Message,
    MessageList, OpenAiError, Run, Thread, VectorStore, VectorStoreFile,
};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, multipart};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::Path;

const ASSISTANTS_BETA: &str = "assistants=v2";

/// Lightweight HTTP client for OpenAI operations.
///
/// Cloning is cheap: the underlying `reqwest::Client` shares its connection pool.
#[derive(Clone)]
pub struct OpenAiClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl OpenAiClient {
    /// Construct a client against `base_url` authenticated with `api_key`.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, OpenAiError> {
        let client = Client::builder().user_agent("pdfscribe/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(OpenAiError::InvalidUrl)?;
        tracing::debug!(url = %base_url, "Initialized OpenAI HTTP client");

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Upload raw bytes to file storage under the given purpose tag.
    pub async fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        purpose: &str,
    ) -> Result<FileObject, OpenAiError> {
        let size = bytes.len();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))?;
        let form = multipart::Form::new()
            .text("purpose", purpose.to_string())
            .part("file", part);

        let request = self.request(Method::POST, "files").multipart(form);
        let (file, _): (FileObject, _) = self.send(request, "files").await?;
        tracing::debug!(file_id = %file.id, file_name, size, purpose, "File uploaded");
        Ok(file)
    }

    /// Create a vector store that expires after `expires_after_days` of inactivity.
    pub async fn create_vector_store(
        &self,
        name: &str,
        expires_after_days: u32,
    ) -> Result<VectorStore, OpenAiError> {
        let body = json!({
            "name": name,
            "expires_after": {
                "anchor": "last_active_at",
                "days": expires_after_days,
            },
        });
        let request = self.request(Method::POST, "vector_stores").json(&body);
        let (store, _) = self.send(request, "vector_stores").await?;
        Ok(store)
    }

    /// Fetch an existing vector store.
    pub async fn retrieve_vector_store(&self, id: &str) -> Result<VectorStore, OpenAiError> {
        let path = format!("vector_stores/{id}");
        let (store, _) = self.send(self.request(Method::GET, &path), &path).await?;
        Ok(store)
    }

    /// Attach an uploaded file to a vector store, starting asynchronous indexing.
    pub async fn attach_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<VectorStoreFile, OpenAiError> {
        let path = format!("vector_stores/{vector_store_id}/files");
        let request = self
            .request(Method::POST, &path)
            .json(&json!({ "file_id": file_id }));
        let (attached, _) = self.send(request, &path).await?;
        Ok(attached)
    }

    /// Read the indexing status of a file attached to a vector store.
    pub async fn retrieve_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<Polled<VectorStoreFile>, OpenAiError> {
        let path = format!("vector_stores/{vector_store_id}/files/{file_id}");
        let (value, headers) = self.send(self.request(Method::GET, &path), &path).await?;
        Ok(Polled {
            value,
            retry_after: retry_after(&headers),
        })
    }

    /// Create an assistant with the file search tool bound to one vector store.
    pub async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, OpenAiError> {
        let body = json!({
            "name": spec.name,
            "model": spec.model,
            "instructions": spec.instructions,
            "tools": [{ "type": "file_search" }],
            "tool_resources": {
                "file_search": {
                    "vector_store_ids": [spec.vector_store_id],
                }
            },
        });
        let request = self.request(Method::POST, "assistants").json(&body);
        let (assistant, _) = self.send(request, "assistants").await?;
        Ok(assistant)
    }

    /// Fetch an existing assistant.
    pub async fn retrieve_assistant(&self, id: &str) -> Result<Assistant, OpenAiError> {
        let path = format!("assistants/{id}");
        let (assistant, _) = self.send(self.request(Method::GET, &path), &path).await?;
        Ok(assistant)
    }

    /// Open an empty conversation thread.
    pub async fn create_thread(&self) -> Result<Thread, OpenAiError> {
        let request = self.request(Method::POST, "threads").json(&json!({}));
        let (thread, _) = self.send(request, "threads").await?;
        Ok(thread)
    }

    /// Post a user message, optionally attaching files for the file search tool.
    pub async fn create_user_message(
        &self,
        thread_id: &str,
        content: &str,
        attachment_file_ids: &[&str],
    ) -> Result<Message, OpenAiError> {
        let mut body = json!({
            "role": "user",
            "content": content,
        });
        if !attachment_file_ids.is_empty() {
            let attachments: Vec<Value> = attachment_file_ids
                .iter()
                .map(|file_id| {
                    json!({
                        "file_id": file_id,
                        "tools": [{ "type": "file_search" }],
                    })
                })
                .collect();
            body["attachments"] = Value::Array(attachments);
        }

        let path = format!("threads/{thread_id}/messages");
        let request = self.request(Method::POST, &path).json(&body);
        let (message, _) = self.send(request, &path).await?;
        Ok(message)
    }

    /// Start executing an assistant against a thread.
    pub async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, OpenAiError> {
        let path = format!("threads/{thread_id}/runs");
        let request = self
            .request(Method::POST, &path)
            .json(&json!({ "assistant_id": assistant_id }));
        let (run, _) = self.send(request, &path).await?;
        Ok(run)
    }

    /// Read the current state of a run.
    pub async fn retrieve_run(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<Polled<Run>, OpenAiError> {
        let path = format!("threads/{thread_id}/runs/{run_id}");
        let (value, headers) = self.send(self.request(Method::GET, &path), &path).await?;
        Ok(Polled {
            value,
            retry_after: retry_after(&headers),
        })
    }

    /// Return the newest message on a thread, if any.
    pub async fn latest_message(&self, thread_id: &str) -> Result<Option<Message>, OpenAiError> {
        let path = format!("threads/{thread_id}/messages");
        let request = self
            .request(Method::GET, &path)
            .query(&[("order", "desc"), ("limit", "1")]);
        let (list, _): (MessageList, _) = self.send(request, &path).await?;
        Ok(list.data.into_iter().next())
    }

    /// Run a single chat completion.
    pub async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion, OpenAiError> {
        let builder = self.request(Method::POST, "chat/completions").json(request);
        let (completion, _) = self.send(builder, "chat/completions").await?;
        Ok(completion)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        self.client
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA)
    }

    async fn send<T>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<(T, HeaderMap), OpenAiError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            let error = OpenAiError::UnexpectedStatus { status, body };
            tracing::error!(endpoint, error = %error, "OpenAI request failed");
            return Err(error);
        }

        let parsed = serde_json::from_str(&body).map_err(|err| {
            let error = OpenAiError::InvalidResponse {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            };
            tracing::error!(endpoint, error = %error, body = %body, "Unparseable OpenAI response");
            error
        })?;
        Ok((parsed, headers))
    }
}

fn mime_for(file_name: &str) -> &'static str {
    match Path::new(file_name)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
