use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::badges::BadgeRules;
use crate::error::{AppError, Result};
use crate::events::{EventBus, LiveEvent};
use crate::explore::ExploreQuery;
use crate::models::{
    Analysis, AnalysisWithAuthor, ClassifierReport, ContentType, Submission, SubmissionPayload,
    VoteTally,
};
use crate::traits::{AnalysisRepo, Classifier, UserRepo};

pub const MAX_TEXT_CHARS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct SubmissionLimits {
    pub max_upload_bytes: usize,
    /// How many recent analyses explore filters over.
    pub explore_window: i64,
}

impl Default for SubmissionLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 25 * 1024 * 1024,
            explore_window: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Submitted {
    pub analysis: Analysis,
    pub saved: bool,
}

#[derive(Clone)]
pub struct AnalysisService {
    analyses: Arc<dyn AnalysisRepo>,
    users: Arc<dyn UserRepo>,
    classifier: Arc<dyn Classifier>,
    events: EventBus,
    badges: BadgeRules,
    limits: SubmissionLimits,
}

impl AnalysisService {
    pub fn new(
        analyses: Arc<dyn AnalysisRepo>,
        users: Arc<dyn UserRepo>,
        classifier: Arc<dyn Classifier>,
        events: EventBus,
        badges: BadgeRules,
        limits: SubmissionLimits,
    ) -> Self {
        Self { analyses, users, classifier, events, badges, limits }
    }

    /// Classifies the submission and, unless the user opted out, saves it.
    /// `save` overrides the user's `auto_save` setting.
    #[instrument(skip(self, submission), fields(uid = %submission.user_id, kind = %submission.content_type))]
    pub async fn submit(&self, submission: Submission, save: Option<bool>) -> Result<Submitted> {
        validate(&submission, &self.limits)?;

        let report = self.classifier.classify(&submission).await?;
        let analysis = analysis_from_report(&submission, report)?;
        debug!(verdict = %analysis.verdict, confidence = analysis.confidence_score, "classified");

        let save = match save {
            Some(explicit) => explicit,
            None => self
                .users
                .get_user(&submission.user_id)
                .await?
                .map_or(true, |u| u.settings.auto_save),
        };
        if !save {
            return Ok(Submitted { analysis, saved: false });
        }

        self.analyses.save_analysis(&analysis).await?;
        info!(analysis_id = %analysis.id, "analysis saved");

        super::refresh_badges(self.users.as_ref(), &self.badges, &analysis.user_id).await;
        // The analysis is committed; a failed re-read only costs the live event.
        match self.analyses.get_analysis(analysis.id).await {
            Ok(Some(row)) => self.events.publish(LiveEvent::AnalysisCreated { analysis: Box::new(row) }),
            Ok(None) => warn!(analysis_id = %analysis.id, "saved analysis vanished before publishing"),
            Err(e) => warn!(analysis_id = %analysis.id, error = %e, "could not reload saved analysis"),
        }
        Ok(Submitted { analysis, saved: true })
    }

    pub async fn get(&self, id: Uuid) -> Result<AnalysisWithAuthor> {
        self.analyses
            .get_analysis(id)
            .await?
            .ok_or_else(|| AppError::not_found("analysis", id))
    }

    #[instrument(skip(self))]
    pub async fn explore(&self, query: &ExploreQuery) -> Result<Vec<AnalysisWithAuthor>> {
        let window = self.limits.explore_window.max(query.limit as i64);
        let recent = self.analyses.list_recent(window).await?;
        Ok(query.apply(recent))
    }

    pub async fn user_analyses(&self, uid: &str, limit: i64) -> Result<Vec<Analysis>> {
        self.analyses.list_user_analyses(uid, limit).await
    }
}

fn validate(submission: &Submission, limits: &SubmissionLimits) -> Result<()> {
    match (&submission.payload, submission.content_type) {
        (SubmissionPayload::Text(text), _) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(AppError::ValidationError("content must not be empty".into()));
            }
            if trimmed.chars().count() > MAX_TEXT_CHARS {
                return Err(AppError::ValidationError(format!(
                    "content exceeds {MAX_TEXT_CHARS} characters"
                )));
            }
        }
        (SubmissionPayload::File { .. }, ContentType::Text) => {
            return Err(AppError::ValidationError("text submissions cannot carry a file".into()));
        }
        (SubmissionPayload::File { mime, data, .. }, kind) => {
            if data.is_empty() {
                return Err(AppError::ValidationError("uploaded file is empty".into()));
            }
            if data.len() > limits.max_upload_bytes {
                return Err(AppError::ValidationError(format!(
                    "uploaded file exceeds {} bytes",
                    limits.max_upload_bytes
                )));
            }
            let expected = match kind {
                ContentType::Image => mime::IMAGE,
                _ => mime::VIDEO,
            };
            if mime.type_() != expected {
                return Err(AppError::ValidationError(format!(
                    "expected a {kind} file, got {mime}"
                )));
            }
        }
    }
    Ok(())
}

/// Reshapes the classifier's report into a fresh, unsaved analysis.
fn analysis_from_report(submission: &Submission, report: ClassifierReport) -> Result<Analysis> {
    let verdict = report.verdict.parse()?;
    let confidence_score = if report.confidence_score.is_finite() {
        report.confidence_score.clamp(0.0, 100.0)
    } else {
        0.0
    };
    Ok(Analysis {
        id: Uuid::now_v7(),
        user_id: submission.user_id.clone(),
        content_type: submission.content_type,
        content: submission.content_label(),
        verdict,
        confidence_score,
        summary: report.analysis_summary,
        sources: Analysis::sources_of(&report.evidence),
        evidence: report.evidence,
        credibility_proof: report.credibility_proof,
        community_votes: VoteTally::default(),
        created_at: Utc::now(),
    })
}
