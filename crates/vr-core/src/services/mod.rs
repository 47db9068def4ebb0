//! # Services
//!
//! Orchestration between the HTTP layer and the ports. Handlers call these;
//! these call repos, the classifier and the event bus.

mod analyses;
mod users;
mod votes;

pub use analyses::{AnalysisService, SubmissionLimits, Submitted, MAX_TEXT_CHARS};
pub use users::{UserService, MAX_DISPLAY_NAME_CHARS};
pub use votes::VoteService;

use crate::badges::BadgeRules;
use crate::traits::UserRepo;

/// Grants whatever the user newly qualifies for. Runs after the triggering
/// write has committed, so a failure here is logged rather than surfaced.
pub(crate) async fn refresh_badges(users: &dyn UserRepo, rules: &BadgeRules, uid: &str) {
    let user = match users.get_user(uid).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(uid, error = %err, "could not load user for badge check");
            return;
        }
    };
    let earned = rules.newly_earned(&user);
    if earned.is_empty() {
        return;
    }
    match users.grant_badges(uid, &earned).await {
        Ok(()) => tracing::info!(uid, badges = ?earned, "badges granted"),
        Err(err) => tracing::warn!(uid, error = %err, "could not grant badges"),
    }
}
