use askama::Template;
use axum::extract::State;
use axum::response::Html;
use vr_core::error::AppError;
use vr_ui::{ExploreTemplate, ReportTemplate};

use super::analyses::ExploreParams;
use crate::error::ApiError;
use crate::extract::{AnalysisId, QueryParams};
use crate::state::AppState;

fn render(template: &impl Template) -> Result<Html<String>, ApiError> {
    template
        .render()
        .map(Html)
        .map_err(|e| ApiError(AppError::Internal(format!("rendering page: {e}"))))
}

pub async fn report(State(state): State<AppState>, AnalysisId(id): AnalysisId) -> Result<Html<String>, ApiError> {
    let row = state.analyses.get(id).await?;
    render(&ReportTemplate::new(&row))
}

pub async fn explore(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ExploreParams>,
) -> Result<Html<String>, ApiError> {
    let query = params.to_query(&state.limits)?;
    let rows = state.analyses.explore(&query).await?;
    render(&ExploreTemplate::new(&query, &rows))
}
