use std::sync::Arc;

use tracing::{info, instrument};

use crate::badges::BadgeRules;
use crate::error::{AppError, Result};
use crate::events::{EventBus, LiveEvent};
use crate::models::{ProfileUpdate, User, UserSettings};
use crate::traits::UserRepo;

pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepo>,
    events: EventBus,
    badges: BadgeRules,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepo>, events: EventBus, badges: BadgeRules) -> Self {
        Self { users, events, badges }
    }

    pub async fn profile(&self, uid: &str) -> Result<User> {
        self.users
            .get_user(uid)
            .await?
            .ok_or_else(|| AppError::not_found("user", uid))
    }

    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, uid: &str, mut update: ProfileUpdate) -> Result<User> {
        if let Some(name) = update.display_name.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::ValidationError("display name must not be empty".into()));
            }
            if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
                return Err(AppError::ValidationError(format!(
                    "display name exceeds {MAX_DISPLAY_NAME_CHARS} characters"
                )));
            }
        }
        if update.email.as_deref().is_some_and(|e| !e.contains('@')) {
            return Err(AppError::ValidationError("email address is malformed".into()));
        }

        self.users.upsert_profile(uid, &update).await?;
        super::refresh_badges(self.users.as_ref(), &self.badges, uid).await;
        self.profile(uid).await
    }

    /// Defaults for users who haven't written anything yet.
    pub async fn settings(&self, uid: &str) -> Result<UserSettings> {
        Ok(self
            .users
            .get_user(uid)
            .await?
            .map(|u| u.settings)
            .unwrap_or_default())
    }

    pub async fn update_settings(&self, uid: &str, settings: UserSettings) -> Result<UserSettings> {
        Ok(self.users.update_settings(uid, &settings).await?.settings)
    }

    #[instrument(skip(self))]
    pub async fn delete_account(&self, uid: &str) -> Result<()> {
        let recounted = self.users.delete_user(uid).await?;
        info!(retracted = recounted.len(), "account deleted");
        for update in recounted {
            self.events.publish(LiveEvent::TallyChanged {
                analysis_id: update.analysis_id,
                community_votes: update.community_votes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TallyUpdate, VoteTally};
    use crate::traits::MockUserRepo;
    use uuid::Uuid;

    #[tokio::test]
    async fn blank_display_name_is_rejected_before_the_store() {
        let mut users = MockUserRepo::new();
        users.expect_upsert_profile().never();
        let svc = UserService::new(Arc::new(users), EventBus::default(), BadgeRules::default());
        let err = svc
            .update_profile("u1", ProfileUpdate { display_name: Some("   ".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn settings_default_for_unknown_users() {
        let mut users = MockUserRepo::new();
        users.expect_get_user().returning(|_| Ok(None));
        let svc = UserService::new(Arc::new(users), EventBus::default(), BadgeRules::default());
        assert_eq!(svc.settings("nobody").await.unwrap(), UserSettings::default());
    }

    #[tokio::test]
    async fn deleting_an_account_announces_recounted_tallies() {
        let id = Uuid::now_v7();
        let mut users = MockUserRepo::new();
        users.expect_delete_user().returning(move |_| {
            Ok(vec![TallyUpdate { analysis_id: id, community_votes: VoteTally { up: 0, down: 2 } }])
        });
        let svc = UserService::new(Arc::new(users), EventBus::default(), BadgeRules::default());
        let mut live = svc.events.subscribe();
        svc.delete_account("u1").await.unwrap();
        assert_eq!(live.recv().await.unwrap().kind(), "tally_changed");
    }
}
