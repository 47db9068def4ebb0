//! Filtering and ordering for the community explore feed.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{AnalysisWithAuthor, ContentType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Recent,
    Votes,
    Credibility,
}

impl SortOrder {
    pub const ALL: [SortOrder; 3] = [SortOrder::Recent, SortOrder::Votes, SortOrder::Credibility];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Recent => "recent",
            SortOrder::Votes => "votes",
            SortOrder::Credibility => "credibility",
        }
    }
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recent" => Ok(SortOrder::Recent),
            "votes" => Ok(SortOrder::Votes),
            "credibility" => Ok(SortOrder::Credibility),
            other => Err(AppError::ValidationError(format!("unknown sort order `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExploreQuery {
    pub search: Option<String>,
    pub content_type: Option<ContentType>,
    pub sort: SortOrder,
    pub limit: usize,
}

impl ExploreQuery {
    /// Parses the raw query-string values; `"all"` and empty strings mean "no filter".
    pub fn parse(
        search: Option<&str>,
        content_type: Option<&str>,
        sort: Option<&str>,
        limit: usize,
    ) -> crate::Result<Self> {
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let content_type = match content_type.map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(raw.parse()?),
        };
        let sort = match sort.map(str::trim) {
            None | Some("") => SortOrder::default(),
            Some(raw) => raw.parse()?,
        };
        Ok(Self { search, content_type, sort, limit })
    }

    fn matches(&self, row: &AnalysisWithAuthor) -> bool {
        if let Some(wanted) = self.content_type {
            if row.analysis.content_type != wanted {
                return false;
            }
        }
        match &self.search {
            Some(needle) => {
                row.analysis.content.to_lowercase().contains(needle)
                    || row.analysis.summary.to_lowercase().contains(needle)
            }
            None => true,
        }
    }

    /// Filters then sorts. Ties fall back to newest first.
    pub fn apply(&self, rows: Vec<AnalysisWithAuthor>) -> Vec<AnalysisWithAuthor> {
        let mut rows: Vec<_> = rows.into_iter().filter(|r| self.matches(r)).collect();
        let newest_first = |a: &AnalysisWithAuthor, b: &AnalysisWithAuthor| {
            b.analysis
                .created_at
                .cmp(&a.analysis.created_at)
                .then_with(|| b.analysis.id.cmp(&a.analysis.id))
        };
        match self.sort {
            SortOrder::Recent => rows.sort_by(newest_first),
            SortOrder::Votes => rows.sort_by(|a, b| {
                b.analysis
                    .community_votes
                    .total()
                    .cmp(&a.analysis.community_votes.total())
                    .then_with(|| newest_first(a, b))
            }),
            SortOrder::Credibility => rows.sort_by(|a, b| {
                b.analysis
                    .confidence_score
                    .partial_cmp(&a.analysis.confidence_score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| newest_first(a, b))
            }),
        }
        rows.truncate(self.limit);
        rows
    }
}
