//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Analysis, AnalysisWithAuthor, Badge, ClassifierReport, ProfileUpdate, Submission, TallyUpdate,
    User, UserSettings, UserVote, VoteOutcome, VoteTally,
};
use crate::voting::VoteIntent;

/// Persistence contract for analyses.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AnalysisRepo: Send + Sync {
    /// Stores a new analysis with a zero tally, creating the author's user row
    /// if needed and bumping their `total_analyses`, all in one transaction.
    async fn save_analysis(&self, analysis: &Analysis) -> Result<()>;
    async fn get_analysis(&self, id: Uuid) -> Result<Option<AnalysisWithAuthor>>;
    /// Newest first.
    async fn list_user_analyses(&self, user_id: &str, limit: i64) -> Result<Vec<Analysis>>;
    /// Newest first, across all users.
    async fn list_recent(&self, limit: i64) -> Result<Vec<AnalysisWithAuthor>>;
}

/// Persistence contract for user profiles and counters.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, uid: &str) -> Result<Option<User>>;
    /// Creates the row on first use.
    async fn upsert_profile(&self, uid: &str, update: &ProfileUpdate) -> Result<User>;
    /// Creates the row on first use.
    async fn update_settings(&self, uid: &str, settings: &UserSettings) -> Result<User>;
    /// Idempotent; already-held badges are ignored.
    async fn grant_badges(&self, uid: &str, badges: &[Badge]) -> Result<()>;
    /// Retracts the user's votes, recounts the analyses they touched and drops
    /// the account. Returns the recounted tallies.
    async fn delete_user(&self, uid: &str) -> Result<Vec<TallyUpdate>>;
}

/// Vote storage. Implementations must record a vote atomically with its tally.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VoteRepo: Send + Sync {
    async fn get_vote(&self, user_id: &str, analysis_id: Uuid) -> Result<Option<UserVote>>;
    async fn apply_vote(&self, user_id: &str, analysis_id: Uuid, intent: VoteIntent) -> Result<VoteOutcome>;
    /// Rebuilds the stored tally from vote rows.
    async fn recount(&self, analysis_id: Uuid) -> Result<VoteTally>;
}

/// The external detection service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, submission: &Submission) -> Result<ClassifierReport>;
}

/// Verifies identity tokens minted by the upstream auth provider.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// Returns the uid the token was issued for.
    fn verify(&self, token: &str) -> Result<String>;
    fn issue(&self, uid: &str) -> String;
}
