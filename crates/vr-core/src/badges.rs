use chrono::{DateTime, Utc};

use crate::models::{Badge, User};

pub const TRUTH_SEEKER_ANALYSES: i64 = 100;
pub const COMMUNITY_HELPER_KARMA: i64 = 50;
pub const FACT_CHECKER_ACCURACY: f64 = 95.0;

/// Thresholds for awarding badges. Awards are monotonic; nothing here revokes.
#[derive(Debug, Clone, Default)]
pub struct BadgeRules {
    /// Accounts created before this instant get Early Adopter.
    pub early_adopter_cutoff: Option<DateTime<Utc>>,
}

impl BadgeRules {
    pub fn qualifies(&self, badge: Badge, user: &User) -> bool {
        match badge {
            Badge::TruthSeeker => user.total_analyses >= TRUTH_SEEKER_ANALYSES,
            Badge::CommunityHelper => user.karma >= COMMUNITY_HELPER_KARMA,
            Badge::EarlyAdopter => self
                .early_adopter_cutoff
                .is_some_and(|cutoff| user.created_at < cutoff),
            Badge::FactChecker => {
                user.total_analyses > 0 && user.accuracy_rate >= FACT_CHECKER_ACCURACY
            }
        }
    }

    /// Badges the user qualifies for but doesn't hold yet.
    pub fn newly_earned(&self, user: &User) -> Vec<Badge> {
        Badge::ALL
            .into_iter()
            .filter(|b| !user.badges.contains(b) && self.qualifies(*b, user))
            .collect()
    }
}
