//! Core data types and error definitions for the analysis pipeline.

use crate::{analysis::prompts::DEFAULT_FILE_NAME, config::ConfigError, openai::OpenAiError};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Coarse classification of an analysis failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid server configuration.
    Configuration,
    /// Caller sent an unusable request.
    Validation,
    /// Upstream failure that may succeed on retry.
    UpstreamTransient,
    /// Upstream failure that will not succeed on retry.
    UpstreamPermanent,
}

/// Errors emitted by the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Server configuration prevented the session from starting.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// The request carried no `file` field.
    #[error("PDF not found")]
    MissingFile,
    /// The upload exceeded the configured body limit.
    #[error("Upload exceeds the size limit: {0}")]
    UploadTooLarge(String),
    /// The multipart body could not be read.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
    /// A remote OpenAI call failed.
    #[error(transparent)]
    Upstream(#[from] OpenAiError),
    /// The newest thread message was not an assistant reply with text.
    #[error("Assistant reply on thread {thread_id} contained no text")]
    EmptyReply {
        /// Thread that was inspected.
        thread_id: String,
    },
}

impl AnalysisError {
    /// Classify the error so callers can tell retryable failures from terminal ones.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::MissingFile | Self::UploadTooLarge(_) | Self::InvalidUpload(_) => {
                ErrorKind::Validation
            }
            Self::Upstream(error) if error.is_transient() => ErrorKind::UpstreamTransient,
            Self::Upstream(_) | Self::EmptyReply { .. } => ErrorKind::UpstreamPermanent,
        }
    }
}

/// A PDF received from a caller.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    /// File name forwarded to file storage.
    pub file_name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl PdfUpload {
    /// Wrap uploaded bytes, defaulting the name to `upload.pdf` when none was sent.
    pub fn new(file_name: Option<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        Self { file_name, bytes }
    }

    /// Hex-encoded SHA-256 of the contents, used to correlate uploads in logs.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Result of the direct chat completion route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatAnalysis {
    /// Identifier of the uploaded file.
    pub file_id: String,
    /// Generated analysis with surrounding whitespace removed.
    pub analysis: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn upload_name_defaults_when_blank() {
        assert_eq!(PdfUpload::new(None, vec![]).file_name, "upload.pdf");
        assert_eq!(
            PdfUpload::new(Some("  ".into()), vec![]).file_name,
            "upload.pdf"
        );
        assert_eq!(
            PdfUpload::new(Some("report.pdf".into()), vec![]).file_name,
            "report.pdf"
        );
    }

    #[test]
    fn digest_is_stable_sha256() {
        let upload = PdfUpload::new(None, b"abc".to_vec());
        assert_eq!(
            upload.digest(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn kinds_separate_retryable_failures() {
        assert_eq!(AnalysisError::MissingFile.kind(), ErrorKind::Validation);
        assert_eq!(
            AnalysisError::from(ConfigError::MissingVariable("OPENAI_API_KEY".into())).kind(),
            ErrorKind::Configuration
        );
        let throttled = OpenAiError::UnexpectedStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        assert_eq!(
            AnalysisError::from(throttled).kind(),
            ErrorKind::UpstreamTransient
        );
        let failed_run = OpenAiError::RunFailed {
            run_id: "run_1".into(),
            status: "failed".into(),
            message: "server_error".into(),
        };
        assert_eq!(
            AnalysisError::from(failed_run).kind(),
            ErrorKind::UpstreamPermanent
        );
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let value = serde_json::to_value(ErrorKind::UpstreamTransient).expect("serialize");
        assert_eq!(value, "upstream_transient");
    }
}
