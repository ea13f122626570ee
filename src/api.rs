//! HTTP surface for pdfscribe.
//!
//! The router exposes three ways to analyze a PDF plus a metrics probe:
//!
//! - `POST /analyze` – Upload the multipart `file` field, index it into the shared vector store,
//!   run the assistant, and return the reply as `text/plain; charset=utf-8`. Errors are JSON
//!   (`{"error": ..., "kind": ...}`) with status 400 (no file), 413 (over the body limit), or
//!   500 (anything upstream).
//! - `ANY /analyze_pdf` – Same pipeline with function-style responses: 405 `Only POST` for other
//!   methods and a plain-text 400 when the file is missing.
//! - `POST /upload_pdf/` – Upload the file and analyze it with one chat completion, returning
//!   `{"file_id": ..., "analysis": ...}`.
//! - `GET /metrics` – Request counters and the last success timestamp.
//!
//! All routes share one [`AnalysisApi`] implementation, so the vector store and assistant are
//! bootstrapped once no matter which route is hit first.

use crate::analysis::{AnalysisApi, AnalysisError, ChatAnalysis, ErrorKind, PdfUpload};
use crate::metrics::{AnalysisMetrics, MetricsSnapshot};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use serde_json::json;
use std::sync::Arc;

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
const UPLOAD_FIELD: &str = "file";

/// Build the HTTP router exposing the analysis API surface.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: AnalysisApi + 'static,
{
    Router::new()
        .route("/analyze", post(analyze::<S>))
        .route("/analyze_pdf", any(analyze_pdf::<S>))
        .route("/upload_pdf/", post(upload_pdf::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(service)
}

/// Summarize an uploaded PDF through the assistant.
async fn analyze<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError>
where
    S: AnalysisApi,
{
    service.metrics().record_request();
    let result: Result<String, AnalysisError> = async {
        let upload = read_upload(multipart).await?;
        service.summarize_pdf(upload).await
    }
    .await;
    let summary = track(service.metrics(), result)?;
    Ok(plain_text(StatusCode::OK, summary))
}

/// Function-style variant of [`analyze`] that checks the method itself.
async fn analyze_pdf<S>(
    method: Method,
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response
where
    S: AnalysisApi,
{
    service.metrics().record_request();
    if method != Method::POST {
        service.metrics().record_rejection();
        tracing::warn!(%method, "Rejected non-POST analysis request");
        return plain_text(StatusCode::METHOD_NOT_ALLOWED, "Only POST".to_string());
    }

    let result: Result<String, AnalysisError> = async {
        let upload = read_upload(multipart).await?;
        service.summarize_pdf(upload).await
    }
    .await;
    match track(service.metrics(), result) {
        Ok(summary) => plain_text(StatusCode::OK, summary),
        Err(error) if error.kind() == ErrorKind::Validation => {
            plain_text(status_for(&error), error.to_string())
        }
        Err(error) => AppError(error).into_response(),
    }
}

/// Analyze an uploaded PDF with a single chat completion.
async fn upload_pdf<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError>
where
    S: AnalysisApi,
{
    service.metrics().record_request();
    let result: Result<ChatAnalysis, AnalysisError> = async {
        let upload = read_upload(multipart).await?;
        service.analyze_with_chat(upload).await
    }
    .await;
    let analysis = track(service.metrics(), result)?;
    Ok(Json(analysis).into_response())
}

/// Return request counters for dashboards and smoke checks.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: AnalysisApi,
{
    Json(service.metrics().snapshot())
}

/// Pull the `file` field out of a multipart body.
///
/// Bodies that are not multipart, lack the field, or carry an empty file all count as a missing
/// PDF so the caller gets the same 400 without any upstream call.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PdfUpload, AnalysisError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!(reason = %rejection.body_text(), "Request body is not multipart");
            return Err(AnalysisError::MissingFile);
        }
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(upload_error)?;
        if bytes.is_empty() {
            return Err(AnalysisError::MissingFile);
        }
        return Ok(PdfUpload::new(file_name, bytes.to_vec()));
    }

    Err(AnalysisError::MissingFile)
}

/// Body-limit overruns surface as 413; any other multipart failure is a malformed upload.
fn upload_error(err: MultipartError) -> AnalysisError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AnalysisError::UploadTooLarge(err.body_text())
    } else {
        AnalysisError::InvalidUpload(err.body_text())
    }
}

fn status_for(error: &AnalysisError) -> StatusCode {
    match error {
        AnalysisError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        _ => match error.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Configuration
            | ErrorKind::UpstreamTransient
            | ErrorKind::UpstreamPermanent => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

/// Record the outcome in metrics and logs before it becomes a response.
fn track<T>(
    metrics: &AnalysisMetrics,
    result: Result<T, AnalysisError>,
) -> Result<T, AnalysisError> {
    match &result {
        Ok(_) => metrics.record_success(),
        Err(error) if error.kind() == ErrorKind::Validation => {
            metrics.record_rejection();
            tracing::warn!(error = %error, "Rejected analysis request");
        }
        Err(error) => {
            metrics.record_failure();
            tracing::error!(error = %error, kind = ?error.kind(), details = ?error, "Analysis failed");
        }
    }
    result
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN_UTF8)], body).into_response()
}

struct AppError(AnalysisError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(&self.0);
        let body = json!({
            "error": self.0.to_string(),
            "kind": kind,
        });
        (status, Json(body)).into_response()
    }
}

impl From<AnalysisError> for AppError {
    fn from(inner: AnalysisError) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::analysis::{AnalysisApi, AnalysisError, ChatAnalysis, PdfUpload};
    use crate::metrics::AnalysisMetrics;
    use crate::openai::OpenAiError;
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
        response::Response,
    };
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "pdfscribe-test-boundary";

    fn multipart_request(uri: &str, field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    fn content_type(response: &Response) -> &str {
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    #[derive(Default)]
    struct StubAnalysisService {
        calls: Mutex<Vec<PdfUpload>>,
        fail: bool,
        metrics: AnalysisMetrics,
    }

    impl StubAnalysisService {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        async fn recorded_calls(&self) -> Vec<PdfUpload> {
            self.calls.lock().await.clone()
        }

        async fn record(&self, upload: PdfUpload) -> Result<(), AnalysisError> {
            self.calls.lock().await.push(upload);
            if self.fail {
                return Err(AnalysisError::Upstream(OpenAiError::RunFailed {
                    run_id: "run_1".into(),
                    status: "failed".into(),
                    message: "server_error: boom".into(),
                }));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AnalysisApi for StubAnalysisService {
        async fn summarize_pdf(&self, upload: PdfUpload) -> Result<String, AnalysisError> {
            self.record(upload).await?;
            Ok("Patient shows normal results.".to_string())
        }

        async fn analyze_with_chat(
            &self,
            upload: PdfUpload,
        ) -> Result<ChatAnalysis, AnalysisError> {
            self.record(upload).await?;
            Ok(ChatAnalysis {
                file_id: "f1".into(),
                analysis: "Looks healthy.".into(),
            })
        }

        fn metrics(&self) -> &AnalysisMetrics {
            &self.metrics
        }
    }

    fn router(service: &Arc<StubAnalysisService>) -> Router {
        create_router(service.clone(), 1024 * 1024)
    }

    #[tokio::test]
    async fn analyze_returns_plain_text_summary() {
        let service = Arc::new(StubAnalysisService::default());
        let response = router(&service)
            .oneshot(multipart_request("/analyze", "file", "report.pdf", b"%PDF-1.7"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), "text/plain; charset=utf-8");
        assert_eq!(body_string(response).await, "Patient shows normal results.");

        let calls = service.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].file_name, "report.pdf");
        assert_eq!(calls[0].bytes, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn analyze_without_file_field_is_bad_request() {
        let service = Arc::new(StubAnalysisService::default());
        let response = router(&service)
            .oneshot(multipart_request("/analyze", "document", "report.pdf", b"%PDF"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("json body");
        assert_eq!(json["error"], "PDF not found");
        assert_eq!(json["kind"], "validation");
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn non_multipart_body_counts_as_missing_file() {
        let service = Arc::new(StubAnalysisService::default());
        let response = router(&service)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/analyze")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_payload_too_large() {
        let service = Arc::new(StubAnalysisService::default());
        let app = create_router(service.clone(), 256);
        let response = app
            .oneshot(multipart_request(
                "/analyze",
                "file",
                "scan.pdf",
                &vec![b'x'; 4096],
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("json body");
        assert_eq!(json["kind"], "validation");
        assert!(service.recorded_calls().await.is_empty());
        assert_eq!(service.metrics.snapshot().requests_rejected, 1);
    }

    #[tokio::test]
    async fn upstream_failure_is_json_500() {
        let service = Arc::new(StubAnalysisService::failing());
        let response = router(&service)
            .oneshot(multipart_request("/analyze", "file", "report.pdf", b"%PDF"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(content_type(&response).starts_with("application/json"));
        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("json body");
        assert_eq!(json["kind"], "upstream_permanent");
        assert!(
            json["error"]
                .as_str()
                .expect("error string")
                .contains("Run run_1 ended with status failed")
        );
    }

    #[tokio::test]
    async fn function_route_rejects_other_methods() {
        let service = Arc::new(StubAnalysisService::default());
        let response = router(&service)
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/analyze_pdf")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_string(response).await, "Only POST");
        assert!(service.recorded_calls().await.is_empty());
        assert_eq!(service.metrics.snapshot().requests_rejected, 1);
    }

    #[tokio::test]
    async fn function_route_reports_missing_file_as_text() {
        let service = Arc::new(StubAnalysisService::default());
        let response = router(&service)
            .oneshot(multipart_request("/analyze_pdf", "file", "empty.pdf", b""))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(content_type(&response), "text/plain; charset=utf-8");
        assert_eq!(body_string(response).await, "PDF not found");
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn function_route_summarizes_posted_file() {
        let service = Arc::new(StubAnalysisService::default());
        let response = router(&service)
            .oneshot(multipart_request("/analyze_pdf", "file", "report.pdf", b"%PDF"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Patient shows normal results.");
    }

    #[tokio::test]
    async fn upload_route_returns_file_id_and_analysis() {
        let service = Arc::new(StubAnalysisService::default());
        let response = router(&service)
            .oneshot(multipart_request("/upload_pdf/", "file", "report.pdf", b"%PDF"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("json body");
        assert_eq!(json["file_id"], "f1");
        assert_eq!(json["analysis"], "Looks healthy.");
    }

    #[tokio::test]
    async fn metrics_reflect_outcomes() {
        let service = Arc::new(StubAnalysisService::default());
        let app = router(&service);
        app.clone()
            .oneshot(multipart_request("/analyze", "file", "report.pdf", b"%PDF"))
            .await
            .expect("success response");
        app.clone()
            .oneshot(multipart_request("/analyze", "other", "report.pdf", b"%PDF"))
            .await
            .expect("rejected response");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("metrics response");
        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("json body");
        assert_eq!(json["requests_received"], 2);
        assert_eq!(json["summaries_completed"], 1);
        assert_eq!(json["requests_rejected"], 1);
        assert_eq!(json["requests_failed"], 0);
        assert!(json["last_success_at"].is_string());
    }
}
