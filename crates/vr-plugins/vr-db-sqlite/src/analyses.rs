use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;
use vr_core::error::{AppError, Result};
use vr_core::models::{Analysis, AnalysisWithAuthor};
use vr_core::traits::AnalysisRepo;

use crate::rows::{self, ANALYSIS_COLUMNS};
use crate::{ensure_user, DbResultExt, SqliteStore};

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(format!("encoding JSON column: {e}")))
}

#[async_trait]
impl AnalysisRepo for SqliteStore {
    /// Inserts the analysis and bumps the author's counter in one transaction,
    /// so `total_analyses` can't drift from the rows that exist.
    #[instrument(skip(self, analysis), fields(analysis_id = %analysis.id))]
    async fn save_analysis(&self, analysis: &Analysis) -> Result<()> {
        let mut tx = self.pool.begin().await.db()?;

        ensure_user(&mut tx, &analysis.user_id).await?;

        sqlx::query(
            "INSERT INTO analyses (id, user_id, content_type, content, verdict, confidence_score, summary, \
             evidence, credibility_proof, up_votes, down_votes, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?)",
        )
        .bind(analysis.id)
        .bind(&analysis.user_id)
        .bind(analysis.content_type.as_str())
        .bind(&analysis.content)
        .bind(analysis.verdict.as_str())
        .bind(analysis.confidence_score)
        .bind(&analysis.summary)
        .bind(to_json(&analysis.evidence)?)
        .bind(to_json(&analysis.credibility_proof)?)
        .bind(analysis.created_at)
        .execute(&mut *tx)
        .await
        .db()?;

        sqlx::query("UPDATE users SET total_analyses = total_analyses + 1 WHERE uid = ?")
            .bind(&analysis.user_id)
            .execute(&mut *tx)
            .await
            .db()?;

        tx.commit().await.db()?;
        Ok(())
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<AnalysisWithAuthor>> {
        let sql = format!(
            "SELECT {ANALYSIS_COLUMNS}, u.display_name AS author_name, u.photo_url AS author_photo \
             FROM analyses a LEFT JOIN users u ON u.uid = a.user_id WHERE a.id = ?"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .db()?;
        row.as_ref().map(rows::analysis_with_author).transpose()
    }

    async fn list_user_analyses(&self, user_id: &str, limit: i64) -> Result<Vec<Analysis>> {
        let sql = format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analyses a WHERE a.user_id = ? \
             ORDER BY a.created_at DESC, a.id DESC LIMIT ?"
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .db()?
            .iter()
            .map(rows::analysis)
            .collect()
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<AnalysisWithAuthor>> {
        let sql = format!(
            "SELECT {ANALYSIS_COLUMNS}, u.display_name AS author_name, u.photo_url AS author_photo \
             FROM analyses a LEFT JOIN users u ON u.uid = a.user_id \
             ORDER BY a.created_at DESC, a.id DESC LIMIT ?"
        );
        sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .db()?
            .iter()
            .map(rows::analysis_with_author)
            .collect()
    }
}
