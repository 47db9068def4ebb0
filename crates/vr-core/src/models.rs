//! # Domain Models
//!
//! These structs represent the core entities of Verity.
//! Analyses use UUID v7 for time-ordered, globally unique identification;
//! users are keyed by the opaque uid the upstream auth provider issues.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Display name used when an author has no profile row.
pub const ANONYMOUS_NAME: &str = "Anonymous User";

/// What kind of content was submitted for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Video => "video",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ContentType::Text),
            "image" => Ok(ContentType::Image),
            "video" => Ok(ContentType::Video),
            other => Err(AppError::ValidationError(format!("unknown content type `{other}`"))),
        }
    }
}

/// Binary label returned by the external model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Fake,
    Real,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Fake => "FAKE",
            Verdict::Real => "REAL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = AppError;

    /// Case-insensitive; the classifier answers "Fake"/"Real" but stored rows use upper case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fake" => Ok(Verdict::Fake),
            "real" => Ok(Verdict::Real),
            other => Err(AppError::Upstream(format!("unrecognised verdict `{other}`"))),
        }
    }
}

/// One side of a community vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        }
    }
}

impl FromStr for VoteDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteDirection::Up),
            "down" => Ok(VoteDirection::Down),
            other => Err(AppError::ValidationError(format!("unknown vote direction `{other}`"))),
        }
    }
}

/// Aggregate vote counters stored on an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub up: i64,
    pub down: i64,
}

impl VoteTally {
    pub fn total(&self) -> i64 {
        self.up + self.down
    }
}

/// A source the classifier matched against the submitted content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub source_title: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub reputation_score: f64,
    #[serde(default)]
    pub similarity_score: f64,
}

/// A specific claim in the content and the fact it was checked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredibilityProof {
    #[serde(default)]
    pub claim_verified: String,
    #[serde(default)]
    pub matched_fact: String,
    #[serde(default)]
    pub source_proof_url: String,
}

/// The classifier's answer, in the classifier's own field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierReport {
    #[serde(default)]
    pub analysis_summary: String,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default)]
    pub credibility_proof: Vec<CredibilityProof>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub input_content: String,
    #[serde(default)]
    pub input_type: String,
    pub verdict: String,
}

/// A classified piece of content, shared with the community once saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub user_id: String,
    pub content_type: ContentType,
    /// The submitted text, or the uploaded file name.
    pub content: String,
    pub verdict: Verdict,
    /// 0..=100
    pub confidence_score: f64,
    pub summary: String,
    pub evidence: Vec<Evidence>,
    pub credibility_proof: Vec<CredibilityProof>,
    /// Evidence URLs, in evidence order.
    pub sources: Vec<String>,
    pub community_votes: VoteTally,
    pub created_at: DateTime<Utc>,
}

impl Analysis {
    pub fn sources_of(evidence: &[Evidence]) -> Vec<String> {
        evidence
            .iter()
            .filter(|e| !e.source_url.is_empty())
            .map(|e| e.source_url.clone())
            .collect()
    }
}

/// An analysis joined with its author's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWithAuthor {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub user_display_name: String,
    pub user_photo_url: Option<String>,
}

/// Earned achievements shown on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    TruthSeeker,
    CommunityHelper,
    EarlyAdopter,
    FactChecker,
}

impl Badge {
    pub const ALL: [Badge; 4] = [
        Badge::TruthSeeker,
        Badge::CommunityHelper,
        Badge::EarlyAdopter,
        Badge::FactChecker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::TruthSeeker => "truth_seeker",
            Badge::CommunityHelper => "community_helper",
            Badge::EarlyAdopter => "early_adopter",
            Badge::FactChecker => "fact_checker",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Badge::TruthSeeker => "Truth Seeker",
            Badge::CommunityHelper => "Community Helper",
            Badge::EarlyAdopter => "Early Adopter",
            Badge::FactChecker => "Fact Checker",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Badge::TruthSeeker => "Verified 100+ pieces of content",
            Badge::CommunityHelper => "Received 50+ helpful votes",
            Badge::EarlyAdopter => "Joined in the first month",
            Badge::FactChecker => "95%+ accuracy rate",
        }
    }
}

impl FromStr for Badge {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Badge::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| AppError::Internal(format!("unknown badge `{s}` in store")))
    }
}

/// Per-user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub email_notifications: bool,
    pub community_notifications: bool,
    pub security_alerts: bool,
    pub default_analysis_mode: ContentType,
    /// Persist every analysis without the client asking for it.
    pub auto_save: bool,
    pub dark_mode: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            community_notifications: false,
            security_alerts: true,
            default_analysis_mode: ContentType::Text,
            auto_save: true,
            dark_mode: false,
        }
    }
}

/// A user account plus its gamification counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub karma: i64,
    pub total_analyses: i64,
    /// Percent of the user's voted-on analyses the community agreed with.
    pub accuracy_rate: f64,
    pub community_votes: i64,
    pub badges: Vec<Badge>,
    pub settings: UserSettings,
}

/// Partial profile update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// One user's vote on one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserVote {
    pub user_id: String,
    pub analysis_id: Uuid,
    pub direction: VoteDirection,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of recording a vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub analysis_id: Uuid,
    /// The caller's vote after the operation.
    pub vote: Option<VoteDirection>,
    pub previous: Option<VoteDirection>,
    pub community_votes: VoteTally,
    #[serde(skip)]
    pub author_id: String,
}

/// A tally as it stands after a store-side change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyUpdate {
    pub analysis_id: Uuid,
    pub community_votes: VoteTally,
}

/// What the user handed us to classify.
#[derive(Debug, Clone)]
pub enum SubmissionPayload {
    Text(String),
    File {
        file_name: String,
        mime: mime::Mime,
        data: Bytes,
    },
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub user_id: String,
    pub content_type: ContentType,
    pub payload: SubmissionPayload,
}

impl Submission {
    /// The value stored as the analysis' `content`.
    pub fn content_label(&self) -> String {
        match &self.payload {
            SubmissionPayload::Text(text) => text.clone(),
            SubmissionPayload::File { file_name, .. } => file_name.clone(),
        }
    }
}
