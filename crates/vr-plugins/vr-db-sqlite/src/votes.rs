use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tracing::{debug, instrument};
use uuid::Uuid;
use vr_core::error::{AppError, Result};
use vr_core::models::{UserVote, VoteDirection, VoteOutcome, VoteTally};
use vr_core::traits::VoteRepo;
use vr_core::voting::{VoteIntent, VoteTransition};

use crate::rows;
use crate::{ensure_user, DbResultExt, SqliteStore};

/// Rebuilds an analysis' tally from its vote rows and refreshes the author's
/// accuracy rate.
pub(crate) async fn recount_in(conn: &mut SqliteConnection, analysis_id: Uuid) -> Result<VoteTally> {
    let row = sqlx::query(
        "UPDATE analyses SET \
         up_votes = (SELECT COUNT(*) FROM votes v WHERE v.analysis_id = analyses.id AND v.direction = 'up'), \
         down_votes = (SELECT COUNT(*) FROM votes v WHERE v.analysis_id = analyses.id AND v.direction = 'down') \
         WHERE id = ? RETURNING user_id, up_votes, down_votes",
    )
    .bind(analysis_id)
    .fetch_optional(&mut *conn)
    .await
    .db()?
    .ok_or_else(|| AppError::not_found("analysis", analysis_id))?;

    let author: String = row.try_get("user_id").db()?;
    refresh_accuracy(conn, &author).await?;
    rows::tally(&row)
}

/// Share of the author's voted-on analyses where the community sided with the verdict.
async fn refresh_accuracy(conn: &mut SqliteConnection, author: &str) -> Result<()> {
    sqlx::query(
        "UPDATE users SET accuracy_rate = COALESCE(( \
             SELECT 100.0 * SUM(CASE WHEN up_votes > down_votes THEN 1 ELSE 0 END) / COUNT(*) \
             FROM analyses WHERE user_id = ? AND up_votes + down_votes > 0 \
         ), 0) WHERE uid = ?",
    )
    .bind(author)
    .bind(author)
    .execute(&mut *conn)
    .await
    .db()?;
    Ok(())
}

#[async_trait]
impl VoteRepo for SqliteStore {
    async fn get_vote(&self, user_id: &str, analysis_id: Uuid) -> Result<Option<UserVote>> {
        let row = sqlx::query(
            "SELECT user_id, analysis_id, direction, created_at, updated_at FROM votes \
             WHERE user_id = ? AND analysis_id = ?",
        )
        .bind(user_id)
        .bind(analysis_id)
        .fetch_optional(&self.pool)
        .await
        .db()?;
        row.as_ref().map(rows::vote).transpose()
    }

    /// Atomic read-modify-write of one user's vote and the derived counters.
    #[instrument(skip(self))]
    async fn apply_vote(&self, user_id: &str, analysis_id: Uuid, intent: VoteIntent) -> Result<VoteOutcome> {
        let mut tx = self.pool.begin().await.db()?;

        // Write first so SQLite grants this transaction the write lock before
        // the prior vote is read; concurrent voters queue behind it.
        let author: String =
            sqlx::query_scalar("UPDATE analyses SET up_votes = up_votes WHERE id = ? RETURNING user_id")
                .bind(analysis_id)
                .fetch_optional(&mut *tx)
                .await
                .db()?
                .ok_or_else(|| AppError::not_found("analysis", analysis_id))?;

        ensure_user(&mut tx, user_id).await?;

        let previous = sqlx::query_scalar::<_, String>(
            "SELECT direction FROM votes WHERE user_id = ? AND analysis_id = ?",
        )
        .bind(user_id)
        .bind(analysis_id)
        .fetch_optional(&mut *tx)
        .await
        .db()?
        .map(|raw| {
            raw.parse::<VoteDirection>()
                .map_err(|_| AppError::Internal(format!("corrupt vote direction `{raw}`")))
        })
        .transpose()?;

        let transition = VoteTransition::resolve(previous, intent);
        if transition.is_noop() {
            let row = sqlx::query("SELECT up_votes, down_votes FROM analyses WHERE id = ?")
                .bind(analysis_id)
                .fetch_one(&mut *tx)
                .await
                .db()?;
            let community_votes = rows::tally(&row)?;
            tx.commit().await.db()?;
            return Ok(VoteOutcome {
                analysis_id,
                vote: previous,
                previous,
                community_votes,
                author_id: author,
            });
        }

        let now = Utc::now();
        match transition.next {
            Some(direction) => {
                sqlx::query(
                    "INSERT INTO votes (user_id, analysis_id, direction, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?) \
                     ON CONFLICT (user_id, analysis_id) DO UPDATE \
                     SET direction = excluded.direction, updated_at = excluded.updated_at",
                )
                .bind(user_id)
                .bind(analysis_id)
                .bind(direction.as_str())
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .db()?;
            }
            None => {
                sqlx::query("DELETE FROM votes WHERE user_id = ? AND analysis_id = ?")
                    .bind(user_id)
                    .bind(analysis_id)
                    .execute(&mut *tx)
                    .await
                    .db()?;
            }
        }

        let delta = transition.tally_delta();
        let row = sqlx::query(
            "UPDATE analyses SET up_votes = MAX(up_votes + ?, 0), down_votes = MAX(down_votes + ?, 0) \
             WHERE id = ? RETURNING up_votes, down_votes",
        )
        .bind(delta.up)
        .bind(delta.down)
        .bind(analysis_id)
        .fetch_one(&mut *tx)
        .await
        .db()?;
        let community_votes = rows::tally(&row)?;

        let participation = transition.participation_delta();
        if participation != 0 {
            sqlx::query("UPDATE users SET community_votes = MAX(community_votes + ?, 0) WHERE uid = ?")
                .bind(participation)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .db()?;
        }

        // No karma for voting on your own analysis.
        let karma = transition.karma_delta();
        if author != user_id && karma != 0 {
            sqlx::query("UPDATE users SET karma = karma + ? WHERE uid = ?")
                .bind(karma)
                .bind(&author)
                .execute(&mut *tx)
                .await
                .db()?;
        }
        refresh_accuracy(&mut tx, &author).await?;

        tx.commit().await.db()?;
        debug!(?previous, next = ?transition.next, "vote applied");

        Ok(VoteOutcome {
            analysis_id,
            vote: transition.next,
            previous,
            community_votes,
            author_id: author,
        })
    }

    #[instrument(skip(self))]
    async fn recount(&self, analysis_id: Uuid) -> Result<VoteTally> {
        let mut tx = self.pool.begin().await.db()?;
        let tally = recount_in(&mut tx, analysis_id).await?;
        tx.commit().await.db()?;
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::analysis;
    use vr_core::traits::{AnalysisRepo, UserRepo};
    use VoteDirection::{Down, Up};

    async fn store_with_analysis() -> (SqliteStore, Uuid) {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = analysis("author", "Vaccines contain microchips");
        store.save_analysis(&a).await.unwrap();
        (store, a.id)
    }

    #[tokio::test]
    async fn toggle_sequence_keeps_tally_and_counters_consistent() {
        let (store, id) = store_with_analysis().await;

        let out = store.apply_vote("voter", id, VoteIntent::Toggle(Up)).await.unwrap();
        assert_eq!((out.previous, out.vote), (None, Some(Up)));
        assert_eq!(out.community_votes, VoteTally { up: 1, down: 0 });
        assert_eq!(out.author_id, "author");

        let out = store.apply_vote("voter", id, VoteIntent::Toggle(Down)).await.unwrap();
        assert_eq!(out.community_votes, VoteTally { up: 0, down: 1 });

        let out = store.apply_vote("voter", id, VoteIntent::Toggle(Down)).await.unwrap();
        assert_eq!(out.vote, None);
        assert_eq!(out.community_votes, VoteTally::default());
        assert!(store.get_vote("voter", id).await.unwrap().is_none());

        store.apply_vote("voter", id, VoteIntent::Toggle(Up)).await.unwrap();
        let voter = store.get_user("voter").await.unwrap().unwrap();
        assert_eq!(voter.community_votes, 1);
        let author = store.get_user("author").await.unwrap().unwrap();
        assert_eq!(author.karma, 1);
        assert_eq!(author.accuracy_rate, 100.0);
    }

    #[tokio::test]
    async fn clearing_without_a_vote_changes_nothing() {
        let (store, id) = store_with_analysis().await;
        let out = store.apply_vote("voter", id, VoteIntent::Clear).await.unwrap();
        assert_eq!((out.previous, out.vote), (None, None));
        assert_eq!(out.community_votes, VoteTally::default());
        let voter = store.get_user("voter").await.unwrap().unwrap();
        assert_eq!(voter.community_votes, 0);
    }

    #[tokio::test]
    async fn self_votes_count_but_earn_no_karma() {
        let (store, id) = store_with_analysis().await;
        let out = store.apply_vote("author", id, VoteIntent::Toggle(Up)).await.unwrap();
        assert_eq!(out.community_votes.up, 1);
        let author = store.get_user("author").await.unwrap().unwrap();
        assert_eq!(author.karma, 0);
        assert_eq!(author.community_votes, 1);
    }

    #[tokio::test]
    async fn voting_on_a_missing_analysis_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = store
            .apply_vote("voter", Uuid::now_v7(), VoteIntent::Toggle(Up))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
        // the failed transaction must not leave a user row behind
        assert!(store.get_user("voter").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recount_repairs_drifted_counters() {
        let (store, id) = store_with_analysis().await;
        store.apply_vote("a", id, VoteIntent::Toggle(Up)).await.unwrap();
        store.apply_vote("b", id, VoteIntent::Toggle(Down)).await.unwrap();
        sqlx::query("UPDATE analyses SET up_votes = 40, down_votes = 0 WHERE id = ?")
            .bind(id)
            .execute(store.pool())
            .await
            .unwrap();

        assert_eq!(store.recount(id).await.unwrap(), VoteTally { up: 1, down: 1 });
    }

    #[tokio::test]
    async fn concurrent_voters_are_never_lost() {
        let path = std::env::temp_dir().join(format!("verity-votes-{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let store = Arc::new(SqliteStore::connect(&url, 8).await.unwrap());
        let a = analysis("author", "Concurrent claim");
        store.save_analysis(&a).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..24 {
            let store = Arc::clone(&store);
            let direction = if i % 3 == 0 { Down } else { Up };
            tasks.push(tokio::spawn(async move {
                store
                    .apply_vote(&format!("voter-{i}"), a.id, VoteIntent::Toggle(direction))
                    .await
            }));
        }
        // one user hammering the same button; ends with at most one vote
        for _ in 0..7 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store.apply_vote("flipper", a.id, VoteIntent::Toggle(Up)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = store.get_analysis(a.id).await.unwrap().unwrap().analysis.community_votes;
        let flipper = store.get_vote("flipper", a.id).await.unwrap();
        // seven toggles of the same button leave the vote cast
        assert_eq!(flipper.map(|v| v.direction), Some(Up));
        assert_eq!(stored, VoteTally { up: 16 + 1, down: 8 });
        assert_eq!(store.recount(a.id).await.unwrap(), stored);

        store.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
