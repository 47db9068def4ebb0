use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use mime::Mime;
use serde::Deserialize;
use tracing::debug;
use vr_core::error::AppError;
use vr_core::explore::ExploreQuery;
use vr_core::models::{AnalysisWithAuthor, ContentType, Submission, SubmissionPayload};

use super::created_or_ok;
use crate::error::ApiError;
use crate::extract::{AnalysisId, CurrentUser, QueryParams};
use crate::state::{ApiLimits, AppState};

/// Query string shared by the explore API and the explore page.
#[derive(Debug, Default, Deserialize)]
pub struct ExploreParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

impl ExploreParams {
    pub fn to_query(&self, limits: &ApiLimits) -> Result<ExploreQuery, ApiError> {
        Ok(ExploreQuery::parse(
            self.q.as_deref(),
            self.content_type.as_deref(),
            self.sort.as_deref(),
            limits.explore(self.limit),
        )?)
    }
}

pub async fn explore(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ExploreParams>,
) -> Result<Json<Vec<AnalysisWithAuthor>>, ApiError> {
    let query = params.to_query(&state.limits)?;
    Ok(Json(state.analyses.explore(&query).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    AnalysisId(id): AnalysisId,
) -> Result<Json<AnalysisWithAuthor>, ApiError> {
    Ok(Json(state.analyses.get(id).await?))
}

pub async fn submit(
    State(state): State<AppState>,
    CurrentUser(uid): CurrentUser,
    form: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let form = form.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let (submission, save) = read_submission(uid, form).await?;
    state.metrics.submitted(submission.content_type.as_str());

    match state.analyses.submit(submission, save).await {
        Ok(submitted) => {
            if submitted.saved {
                state.metrics.saved();
            }
            Ok((created_or_ok(submitted.saved), Json(submitted)))
        }
        Err(err) => {
            if matches!(err, AppError::Upstream(_)) {
                state.metrics.classifier_failed();
            }
            Err(err.into())
        }
    }
}

struct Upload {
    file_name: String,
    mime: Mime,
    data: Bytes,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::bad_request("upload exceeds the size limit");
    }
    ApiError::bad_request(err.body_text())
}

fn parse_flag(raw: &str) -> Result<bool, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        other => Err(ApiError::bad_request(format!("`save` must be a boolean, got `{other}`"))),
    }
}

/// Trusts the declared part type unless it is missing or generic.
fn resolve_mime(declared: Option<&str>, file_name: &str) -> Mime {
    declared
        .and_then(|ct| ct.parse::<Mime>().ok())
        .filter(|m| *m != mime::APPLICATION_OCTET_STREAM)
        .unwrap_or_else(|| mime_guess::from_path(file_name).first_or_octet_stream())
}

/// Reads `input_type`, `input_content`, `save` and at most one file part.
async fn read_submission(
    user_id: String,
    mut form: Multipart,
) -> Result<(Submission, Option<bool>), ApiError> {
    let mut input_type = None;
    let mut input_content = None;
    let mut save = None;
    let mut upload = None;

    while let Some(field) = form.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let mime = resolve_mime(field.content_type(), &file_name);
            let data = field.bytes().await.map_err(multipart_error)?;
            upload = Some(Upload { file_name, mime, data });
            continue;
        }
        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "input_type" => input_type = Some(value),
            "input_content" => input_content = Some(value),
            "save" => save = Some(parse_flag(&value)?),
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }

    let declared = input_type.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let content_type = match (declared, &upload) {
        (Some(raw), _) => raw.parse::<ContentType>()?,
        (None, Some(file)) if file.mime.type_() == mime::IMAGE => ContentType::Image,
        (None, Some(file)) if file.mime.type_() == mime::VIDEO => ContentType::Video,
        (None, Some(_)) => return Err(ApiError::bad_request("input_type is required for this file")),
        (None, None) => ContentType::Text,
    };

    let payload = match (upload, input_content) {
        (Some(Upload { file_name, mime, data }), _) => SubmissionPayload::File { file_name, mime, data },
        (None, Some(text)) => SubmissionPayload::Text(text),
        (None, None) => return Err(ApiError::bad_request("input_content or a file is required")),
    };

    Ok((Submission { user_id, content_type, payload }, save))
}
