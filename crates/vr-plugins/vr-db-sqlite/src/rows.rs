//! Row-to-model mapping.

use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use vr_core::error::{AppError, Result};
use vr_core::models::{
    Analysis, AnalysisWithAuthor, Badge, User, UserVote, VoteTally, ANONYMOUS_NAME,
};

use crate::DbResultExt;

pub(crate) const ANALYSIS_COLUMNS: &str = "a.id, a.user_id, a.content_type, a.content, a.verdict, \
     a.confidence_score, a.summary, a.evidence, a.credibility_proof, a.up_votes, a.down_votes, a.created_at";

pub(crate) const USER_COLUMNS: &str = "uid, email, display_name, photo_url, created_at, karma, \
     total_analyses, accuracy_rate, community_votes, settings";

fn stored<T: std::str::FromStr>(raw: &str, column: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| AppError::Internal(format!("corrupt {column} value `{raw}` in store")))
}

fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column).db()?;
    serde_json::from_str(&raw).map_err(|e| AppError::Internal(format!("corrupt {column} JSON: {e}")))
}

pub(crate) fn analysis(row: &SqliteRow) -> Result<Analysis> {
    let evidence: Vec<_> = json_column(row, "evidence")?;
    Ok(Analysis {
        id: row.try_get("id").db()?,
        user_id: row.try_get("user_id").db()?,
        content_type: stored(row.try_get::<&str, _>("content_type").db()?, "content_type")?,
        content: row.try_get("content").db()?,
        verdict: stored(row.try_get::<&str, _>("verdict").db()?, "verdict")?,
        confidence_score: row.try_get("confidence_score").db()?,
        summary: row.try_get("summary").db()?,
        sources: Analysis::sources_of(&evidence),
        evidence,
        credibility_proof: json_column(row, "credibility_proof")?,
        community_votes: VoteTally {
            up: row.try_get("up_votes").db()?,
            down: row.try_get("down_votes").db()?,
        },
        created_at: row.try_get("created_at").db()?,
    })
}

/// Expects `author_name` and `author_photo` from a LEFT JOIN on users.
pub(crate) fn analysis_with_author(row: &SqliteRow) -> Result<AnalysisWithAuthor> {
    let name: Option<String> = row.try_get("author_name").db()?;
    Ok(AnalysisWithAuthor {
        analysis: analysis(row)?,
        user_display_name: name.unwrap_or_else(|| ANONYMOUS_NAME.to_string()),
        user_photo_url: row.try_get("author_photo").db()?,
    })
}

pub(crate) fn user(row: &SqliteRow, badges: Vec<Badge>) -> Result<User> {
    Ok(User {
        uid: row.try_get("uid").db()?,
        email: row.try_get("email").db()?,
        display_name: row.try_get("display_name").db()?,
        photo_url: row.try_get("photo_url").db()?,
        created_at: row.try_get("created_at").db()?,
        karma: row.try_get("karma").db()?,
        total_analyses: row.try_get("total_analyses").db()?,
        accuracy_rate: row.try_get("accuracy_rate").db()?,
        community_votes: row.try_get("community_votes").db()?,
        badges,
        settings: json_column(row, "settings")?,
    })
}

pub(crate) fn badge(raw: &str) -> Result<Badge> {
    raw.parse()
}

pub(crate) fn vote(row: &SqliteRow) -> Result<UserVote> {
    Ok(UserVote {
        user_id: row.try_get("user_id").db()?,
        analysis_id: row.try_get("analysis_id").db()?,
        direction: stored(row.try_get::<&str, _>("direction").db()?, "direction")?,
        created_at: row.try_get("created_at").db()?,
        updated_at: row.try_get("updated_at").db()?,
    })
}

pub(crate) fn tally(row: &SqliteRow) -> Result<VoteTally> {
    Ok(VoteTally {
        up: row.try_get("up_votes").db()?,
        down: row.try_get("down_votes").db()?,
    })
}
