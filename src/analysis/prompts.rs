//! Fixed prompt text and generation parameters.

/// System instructions bound to the assistant.
pub const ASSISTANT_INSTRUCTIONS: &str = "Examine the medical information in the PDFs with a \
doctor's rigor. Give the user a clear, empathetic, short but thorough summary. Simplify medical \
terms; refer the user to a doctor when needed.";

/// User message posted on every analysis thread.
pub const SUMMARY_REQUEST: &str =
    "Please analyze and summarize the information in the PDF I uploaded.";

/// System message for the direct chat completion route.
pub const CHAT_SYSTEM_PROMPT: &str = "You are a medical assistant.";

/// Output token cap for the direct chat completion route.
pub const CHAT_MAX_TOKENS: u32 = 500;

/// Sampling temperature for the direct chat completion route.
pub const CHAT_TEMPERATURE: f32 = 0.7;

/// Inactivity window after which a freshly created vector store expires.
pub const VECTOR_STORE_EXPIRY_DAYS: u32 = 30;

/// Purpose tag for uploads consumed by assistants and chat file inputs.
pub const UPLOAD_PURPOSE: &str = "assistants";

/// File name used when the client did not send one.
pub const DEFAULT_FILE_NAME: &str = "upload.pdf";
