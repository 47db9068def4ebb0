//! # vr-classifier-http
//!
//! `Classifier` implementation that forwards submissions to the hosted
//! detection API as multipart form data and reshapes its answer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use vr_core::error::{AppError, Result};
use vr_core::models::{ClassifierReport, ContentType, Submission, SubmissionPayload};
use vr_core::traits::Classifier;

const ANALYZE_PATH: &str = "/analyze-content";
const FALLBACK_ERROR: &str = "Failed to analyze content";

pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("verity/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}{ANALYZE_PATH}", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Images go up as a lone `image` part; everything else is labelled with
/// `input_type` and carried in `input_content`.
fn build_form(submission: &Submission) -> Result<Form> {
    let kind = submission.content_type.as_str();
    let form = match &submission.payload {
        SubmissionPayload::Text(text) => Form::new()
            .text("input_type", kind)
            .text("input_content", text.clone()),
        SubmissionPayload::File { file_name, mime, data } => {
            let part = Part::bytes(data.to_vec())
                .file_name(file_name.clone())
                .mime_str(mime.as_ref())
                .map_err(|e| AppError::ValidationError(format!("bad content type {mime}: {e}")))?;
            match submission.content_type {
                ContentType::Image => Form::new().part("image", part),
                _ => Form::new().text("input_type", kind).part("input_content", part),
            }
        }
    };
    Ok(form)
}

/// Strips a surrounding markdown code fence, as LLM-backed services like to add.
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// The API sometimes nests the report as a JSON string under `raw_response`.
pub fn parse_report(body: &str) -> Result<ClassifierReport> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AppError::Upstream(format!("classifier returned invalid JSON: {e}")))?;

    if let Some(raw) = value.get("raw_response").and_then(Value::as_str) {
        match serde_json::from_str(strip_fence(raw)) {
            Ok(report) => return Ok(report),
            Err(e) => debug!(error = %e, "raw_response is not a report, reading body directly"),
        }
    }

    serde_json::from_value(value)
        .map_err(|e| AppError::Upstream(format!("classifier response has unexpected shape: {e}")))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| FALLBACK_ERROR.to_string())
}

#[async_trait]
impl Classifier for HttpClassifier {
    #[instrument(skip(self, submission), fields(kind = %submission.content_type))]
    async fn classify(&self, submission: &Submission) -> Result<ClassifierReport> {
        let form = build_form(submission)?;
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("classifier unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("reading classifier response: {e}")))?;

        if !status.is_success() {
            let message = error_message(&body);
            warn!(%status, %message, "classifier rejected submission");
            return Err(AppError::Upstream(message));
        }
        parse_report(&body)
    }
}
