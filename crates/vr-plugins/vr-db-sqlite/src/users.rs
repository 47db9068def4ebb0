use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use tracing::instrument;
use uuid::Uuid;
use vr_core::error::{AppError, Result};
use vr_core::models::{Badge, ProfileUpdate, TallyUpdate, User, UserSettings};
use vr_core::traits::UserRepo;

use crate::rows::{self, USER_COLUMNS};
use crate::votes::recount_in;
use crate::{ensure_user, DbResultExt, SqliteStore};

async fn load_user(conn: &mut SqliteConnection, uid: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?");
    let Some(row) = sqlx::query(&sql).bind(uid).fetch_optional(&mut *conn).await.db()? else {
        return Ok(None);
    };
    let badges = sqlx::query_scalar::<_, String>(
        "SELECT badge FROM user_badges WHERE uid = ? ORDER BY awarded_at, badge",
    )
    .bind(uid)
    .fetch_all(&mut *conn)
    .await
    .db()?
    .iter()
    .map(|b| rows::badge(b))
    .collect::<Result<Vec<_>>>()?;
    rows::user(&row, badges).map(Some)
}

async fn load_existing(conn: &mut SqliteConnection, uid: &str) -> Result<User> {
    load_user(conn, uid)
        .await?
        .ok_or_else(|| AppError::not_found("user", uid))
}

#[async_trait]
impl UserRepo for SqliteStore {
    async fn get_user(&self, uid: &str) -> Result<Option<User>> {
        let mut conn = self.pool.acquire().await.db()?;
        load_user(&mut conn, uid).await
    }

    #[instrument(skip(self, update))]
    async fn upsert_profile(&self, uid: &str, update: &ProfileUpdate) -> Result<User> {
        let mut tx = self.pool.begin().await.db()?;
        ensure_user(&mut tx, uid).await?;
        sqlx::query(
            "UPDATE users SET display_name = COALESCE(?, display_name), email = COALESCE(?, email), \
             photo_url = COALESCE(?, photo_url) WHERE uid = ?",
        )
        .bind(&update.display_name)
        .bind(&update.email)
        .bind(&update.photo_url)
        .bind(uid)
        .execute(&mut *tx)
        .await
        .db()?;
        let user = load_existing(&mut tx, uid).await?;
        tx.commit().await.db()?;
        Ok(user)
    }

    async fn update_settings(&self, uid: &str, settings: &UserSettings) -> Result<User> {
        let encoded = serde_json::to_string(settings)
            .map_err(|e| AppError::Internal(format!("encoding settings: {e}")))?;
        let mut tx = self.pool.begin().await.db()?;
        ensure_user(&mut tx, uid).await?;
        sqlx::query("UPDATE users SET settings = ? WHERE uid = ?")
            .bind(encoded)
            .bind(uid)
            .execute(&mut *tx)
            .await
            .db()?;
        let user = load_existing(&mut tx, uid).await?;
        tx.commit().await.db()?;
        Ok(user)
    }

    async fn grant_badges(&self, uid: &str, badges: &[Badge]) -> Result<()> {
        let mut tx = self.pool.begin().await.db()?;
        let now = Utc::now();
        for badge in badges {
            sqlx::query(
                "INSERT INTO user_badges (uid, badge, awarded_at) VALUES (?, ?, ?) \
                 ON CONFLICT (uid, badge) DO NOTHING",
            )
            .bind(uid)
            .bind(badge.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .db()?;
        }
        tx.commit().await.db()?;
        Ok(())
    }

    /// Karma already earned by other authors from this user's votes is kept;
    /// only the tallies are rebuilt.
    #[instrument(skip(self))]
    async fn delete_user(&self, uid: &str) -> Result<Vec<TallyUpdate>> {
        let mut tx = self.pool.begin().await.db()?;

        let deleted = sqlx::query("DELETE FROM users WHERE uid = ?")
            .bind(uid)
            .execute(&mut *tx)
            .await
            .db()?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::not_found("user", uid));
        }

        let touched: Vec<Uuid> =
            sqlx::query_scalar("DELETE FROM votes WHERE user_id = ? RETURNING analysis_id")
                .bind(uid)
                .fetch_all(&mut *tx)
                .await
                .db()?;

        let mut recounted = Vec::with_capacity(touched.len());
        for analysis_id in touched {
            let community_votes = recount_in(&mut tx, analysis_id).await?;
            recounted.push(TallyUpdate { analysis_id, community_votes });
        }

        tx.commit().await.db()?;
        Ok(recounted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::analysis;
    use vr_core::models::{ContentType, VoteDirection, VoteTally, ANONYMOUS_NAME};
    use vr_core::traits::{AnalysisRepo, VoteRepo};
    use vr_core::voting::VoteIntent;

    #[tokio::test]
    async fn profile_upsert_creates_then_patches() {
        let store = SqliteStore::in_memory().await.unwrap();
        let created = store
            .upsert_profile(
                "u1",
                &ProfileUpdate {
                    display_name: Some("Ada".into()),
                    email: Some("ada@example.com".into()),
                    photo_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.display_name, "Ada");
        assert_eq!(created.karma, 0);

        let patched = store
            .upsert_profile("u1", &ProfileUpdate { photo_url: Some("https://img/ada.png".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(patched.display_name, "Ada");
        assert_eq!(patched.email.as_deref(), Some("ada@example.com"));
        assert_eq!(patched.photo_url.as_deref(), Some("https://img/ada.png"));
    }

    #[tokio::test]
    async fn settings_and_badges_persist() {
        let store = SqliteStore::in_memory().await.unwrap();
        let settings = UserSettings {
            auto_save: false,
            default_analysis_mode: ContentType::Image,
            ..UserSettings::default()
        };
        let user = store.update_settings("u1", &settings).await.unwrap();
        assert_eq!(user.settings, settings);
        assert_eq!(user.display_name, ANONYMOUS_NAME);

        store.grant_badges("u1", &[Badge::EarlyAdopter]).await.unwrap();
        store.grant_badges("u1", &[Badge::EarlyAdopter, Badge::FactChecker]).await.unwrap();
        let user = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.badges.len(), 2);
        assert!(user.badges.contains(&Badge::FactChecker));
    }

    #[tokio::test]
    async fn deleting_a_user_retracts_their_votes() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = analysis("author", "claim");
        store.save_analysis(&a).await.unwrap();
        store.apply_vote("leaver", a.id, VoteIntent::Toggle(VoteDirection::Up)).await.unwrap();
        store.apply_vote("stayer", a.id, VoteIntent::Toggle(VoteDirection::Down)).await.unwrap();

        let recounted = store.delete_user("leaver").await.unwrap();
        assert_eq!(
            recounted,
            vec![TallyUpdate { analysis_id: a.id, community_votes: VoteTally { up: 0, down: 1 } }]
        );
        assert!(store.get_user("leaver").await.unwrap().is_none());
        assert!(store.get_vote("leaver", a.id).await.unwrap().is_none());

        // analyses of a deleted author stay, shown as anonymous
        store.delete_user("author").await.unwrap();
        let orphan = store.get_analysis(a.id).await.unwrap().unwrap();
        assert_eq!(orphan.user_display_name, ANONYMOUS_NAME);
    }

    #[tokio::test]
    async fn corrupt_settings_are_an_error_not_defaults() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.update_settings("u1", &UserSettings { auto_save: false, ..UserSettings::default() }).await.unwrap();
        sqlx::query("UPDATE users SET settings = 'not json' WHERE uid = 'u1'")
            .execute(store.pool())
            .await
            .unwrap();
        assert!(matches!(store.get_user("u1").await, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn deleting_an_unknown_user_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(matches!(store.delete_user("ghost").await, Err(AppError::NotFound(..))));
    }
}
