#![deny(missing_docs)]

//! Core library for the pdfscribe PDF analysis server.

/// Vector store bootstrap, assistant runs, and the analysis service.
pub mod analysis;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Request metrics helpers.
pub mod metrics;
/// Thin client for the OpenAI files, vector store, assistants, and chat endpoints.
pub mod openai;
