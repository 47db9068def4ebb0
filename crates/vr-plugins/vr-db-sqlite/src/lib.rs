//! # vr-db-sqlite
//!
//! This crate implements the data mapping between the SQLite relational model
//! and the `vr-core` domain models. Vote tallies are kept consistent with the
//! `votes` table by recording each vote inside a single write transaction.

mod analyses;
mod rows;
mod users;
mod votes;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;
use vr_core::error::{AppError, Result};
use vr_core::models::ANONYMOUS_NAME;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    pool: SqlitePool,
}

/// Maps sqlx failures into the domain error at the crate boundary.
pub(crate) trait DbResultExt<T> {
    fn db(self) -> Result<T>;
}

impl<T> DbResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn db(self) -> Result<T> {
        self.map_err(|e| AppError::Internal(format!("database: {e}")))
    }
}

impl SqliteStore {
    /// Opens (creating if needed) the database and runs pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(url)
            .db()?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let mut pool_options = SqlitePoolOptions::new();
        if in_memory {
            // An in-memory database lives and dies with its one connection.
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            if let Some(parent) = Path::new(options.get_filename()).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| AppError::Internal(format!("creating {}: {e}", parent.display())))?;
                }
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
            pool_options = pool_options.max_connections(max_connections.max(1));
        }

        let pool = pool_options.connect_with(options).await.db()?;
        sqlx::migrate!()
            .run(&pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {e}")))?;

        info!(in_memory, "sqlite store ready");
        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Creates the user row the first time a uid writes anything.
pub(crate) async fn ensure_user(conn: &mut SqliteConnection, uid: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (uid, display_name, created_at) VALUES (?, ?, ?) ON CONFLICT (uid) DO NOTHING",
    )
    .bind(uid)
    .bind(ANONYMOUS_NAME)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .db()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use uuid::Uuid;
    use vr_core::models::{Analysis, ContentType, Evidence, Verdict, VoteTally};

    pub fn analysis(author: &str, content: &str) -> Analysis {
        let evidence = vec![Evidence {
            source_title: "Reuters".into(),
            source_url: "https://reuters.com/fact-check".into(),
            summary: "No record of this claim".into(),
            reputation_score: 92.0,
            similarity_score: 41.5,
        }];
        Analysis {
            id: Uuid::now_v7(),
            user_id: author.into(),
            content_type: ContentType::Text,
            content: content.into(),
            verdict: Verdict::Fake,
            confidence_score: 87.0,
            summary: format!("{content} appears fabricated"),
            sources: Analysis::sources_of(&evidence),
            evidence,
            credibility_proof: vec![],
            community_votes: VoteTally::default(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_migrates() {
        let store = SqliteStore::in_memory().await.unwrap();
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert_eq!(tables, vec!["analyses", "user_badges", "users", "votes"]);
    }
}
