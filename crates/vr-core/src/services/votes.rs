use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::badges::BadgeRules;
use crate::error::Result;
use crate::events::{EventBus, LiveEvent};
use crate::models::{UserVote, VoteOutcome, VoteTally};
use crate::traits::{UserRepo, VoteRepo};
use crate::voting::VoteIntent;

#[derive(Clone)]
pub struct VoteService {
    votes: Arc<dyn VoteRepo>,
    users: Arc<dyn UserRepo>,
    events: EventBus,
    badges: BadgeRules,
}

impl VoteService {
    pub fn new(votes: Arc<dyn VoteRepo>, users: Arc<dyn UserRepo>, events: EventBus, badges: BadgeRules) -> Self {
        Self { votes, users, events, badges }
    }

    pub async fn current_vote(&self, uid: &str, analysis_id: Uuid) -> Result<Option<UserVote>> {
        self.votes.get_vote(uid, analysis_id).await
    }

    #[instrument(skip(self))]
    pub async fn vote(&self, uid: &str, analysis_id: Uuid, intent: VoteIntent) -> Result<VoteOutcome> {
        let outcome = self.votes.apply_vote(uid, analysis_id, intent).await?;
        if outcome.previous == outcome.vote {
            return Ok(outcome);
        }
        info!(
            previous = ?outcome.previous,
            vote = ?outcome.vote,
            up = outcome.community_votes.up,
            down = outcome.community_votes.down,
            "vote recorded"
        );
        self.events.publish(LiveEvent::TallyChanged {
            analysis_id,
            community_votes: outcome.community_votes,
        });

        super::refresh_badges(self.users.as_ref(), &self.badges, uid).await;
        if outcome.author_id != uid {
            super::refresh_badges(self.users.as_ref(), &self.badges, &outcome.author_id).await;
        }
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn recount(&self, analysis_id: Uuid) -> Result<VoteTally> {
        let tally = self.votes.recount(analysis_id).await?;
        self.events.publish(LiveEvent::TallyChanged { analysis_id, community_votes: tally });
        Ok(tally)
    }
}
