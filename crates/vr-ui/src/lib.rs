//! # vr-ui
//!
//! Server-rendered pages: the shareable analysis report and the explore feed.
//! Templates live in `templates/` and are compiled in by askama.

use askama::Template;
use vr_core::explore::{ExploreQuery, SortOrder};
use vr_core::models::{AnalysisWithAuthor, ContentType, CredibilityProof, Evidence};

const PREVIEW_CHARS: usize = 280;

/// Flattened, display-ready view of one analysis.
pub struct AnalysisCard {
    pub id: String,
    pub content_type: &'static str,
    pub preview: String,
    pub verdict: &'static str,
    pub confidence: String,
    pub summary: String,
    pub author: String,
    pub author_photo: Option<String>,
    pub up: i64,
    pub down: i64,
    pub created: String,
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

impl From<&AnalysisWithAuthor> for AnalysisCard {
    fn from(row: &AnalysisWithAuthor) -> Self {
        let a = &row.analysis;
        Self {
            id: a.id.to_string(),
            content_type: a.content_type.as_str(),
            preview: preview(&a.content),
            verdict: a.verdict.as_str(),
            confidence: format!("{:.0}%", a.confidence_score),
            summary: a.summary.clone(),
            author: row.user_display_name.clone(),
            author_photo: row.user_photo_url.clone(),
            up: a.community_votes.up,
            down: a.community_votes.down,
            created: a.created_at.format("%b %e, %Y %H:%M UTC").to_string(),
        }
    }
}

/// Classifier output is untrusted: only absolute http(s) URLs become links.
/// Anything else comes back empty and renders as plain text.
fn safe_href(raw: &str) -> String {
    match url::Url::parse(raw.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed.into(),
        _ => String::new(),
    }
}

pub struct EvidenceItem<'a> {
    pub title: &'a str,
    pub href: String,
    pub summary: &'a str,
    pub reputation: f64,
    pub similarity: f64,
}

impl<'a> From<&'a Evidence> for EvidenceItem<'a> {
    fn from(e: &'a Evidence) -> Self {
        Self {
            title: &e.source_title,
            href: safe_href(&e.source_url),
            summary: &e.summary,
            reputation: e.reputation_score,
            similarity: e.similarity_score,
        }
    }
}

pub struct ProofItem<'a> {
    pub claim: &'a str,
    pub fact: &'a str,
    pub href: String,
}

impl<'a> From<&'a CredibilityProof> for ProofItem<'a> {
    fn from(p: &'a CredibilityProof) -> Self {
        Self {
            claim: &p.claim_verified,
            fact: &p.matched_fact,
            href: safe_href(&p.source_proof_url),
        }
    }
}

#[derive(Template)]
#[template(path = "report.html")]
pub struct ReportTemplate<'a> {
    pub title: String,
    pub card: AnalysisCard,
    pub content: &'a str,
    pub evidence: Vec<EvidenceItem<'a>>,
    pub proofs: Vec<ProofItem<'a>>,
}

impl<'a> ReportTemplate<'a> {
    pub fn new(row: &'a AnalysisWithAuthor) -> Self {
        let card = AnalysisCard::from(row);
        Self {
            title: format!("{} verdict: {}", card.verdict, preview_title(&row.analysis.content)),
            card,
            content: &row.analysis.content,
            evidence: row.analysis.evidence.iter().map(EvidenceItem::from).collect(),
            proofs: row.analysis.credibility_proof.iter().map(ProofItem::from).collect(),
        }
    }
}

fn preview_title(content: &str) -> String {
    let mut title: String = content.chars().take(60).collect();
    if content.chars().count() > 60 {
        title.push('…');
    }
    title
}

pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "explore.html")]
pub struct ExploreTemplate {
    pub title: &'static str,
    pub search: String,
    pub types: Vec<SelectOption>,
    pub sorts: Vec<SelectOption>,
    pub cards: Vec<AnalysisCard>,
}

impl ExploreTemplate {
    pub fn new(query: &ExploreQuery, rows: &[AnalysisWithAuthor]) -> Self {
        let mut types = vec![SelectOption {
            value: "all",
            label: "All types",
            selected: query.content_type.is_none(),
        }];
        types.extend(
            [
                (ContentType::Text, "Text"),
                (ContentType::Image, "Images"),
                (ContentType::Video, "Videos"),
            ]
            .into_iter()
            .map(|(kind, label)| SelectOption {
                value: kind.as_str(),
                label,
                selected: query.content_type == Some(kind),
            }),
        );
        let sorts = SortOrder::ALL
            .into_iter()
            .map(|sort| SelectOption {
                value: sort.as_str(),
                label: match sort {
                    SortOrder::Recent => "Most recent",
                    SortOrder::Votes => "Most voted",
                    SortOrder::Credibility => "Highest confidence",
                },
                selected: query.sort == sort,
            })
            .collect();

        Self {
            title: "Explore community analyses",
            search: query.search.clone().unwrap_or_default(),
            types,
            sorts,
            cards: rows.iter().map(AnalysisCard::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use vr_core::models::{Analysis, Verdict, VoteTally};

    fn row(content: &str) -> AnalysisWithAuthor {
        AnalysisWithAuthor {
            analysis: Analysis {
                id: Uuid::now_v7(),
                user_id: "u1".into(),
                content_type: ContentType::Text,
                content: content.into(),
                verdict: Verdict::Fake,
                confidence_score: 87.4,
                summary: "No credible outlet reports this.".into(),
                evidence: vec![Evidence {
                    source_title: "Reuters Fact Check".into(),
                    source_url: "https://reuters.com/fact-check".into(),
                    summary: "Debunked".into(),
                    reputation_score: 95.0,
                    similarity_score: 80.0,
                }],
                credibility_proof: vec![],
                sources: vec!["https://reuters.com/fact-check".into()],
                community_votes: VoteTally { up: 3, down: 1 },
                created_at: Utc::now(),
            },
            user_display_name: "Ada".into(),
            user_photo_url: None,
        }
    }

    #[test]
    fn report_renders_verdict_and_escapes_content() {
        let r = row("<script>alert('x')</script> moon landing was staged");
        let html = ReportTemplate::new(&r).render().unwrap();
        assert!(html.contains("FAKE"));
        assert!(html.contains("87%"));
        assert!(html.contains("Reuters Fact Check"));
        assert!(!html.contains("<script>alert"));
    }

    #[test]
    fn report_links_only_http_sources() {
        let mut r = row("claim");
        r.analysis.evidence[0].source_url = "javascript:alert(document.cookie)".into();
        r.analysis.evidence.push(Evidence {
            source_title: "AP News".into(),
            source_url: " https://apnews.com/article ".into(),
            summary: "Same story".into(),
            reputation_score: 90.0,
            similarity_score: 70.0,
        });
        r.analysis.credibility_proof = vec![CredibilityProof {
            claim_verified: "Photo is recent".into(),
            matched_fact: "Taken in 2012".into(),
            source_proof_url: "data:text/html,<b>hi</b>".into(),
        }];

        let html = ReportTemplate::new(&r).render().unwrap();
        assert!(!html.contains("javascript:"));
        assert!(!html.contains("data:text"));
        assert!(html.contains("Reuters Fact Check"));
        assert!(!html.contains("Reuters Fact Check</a>"));
        assert!(html.contains("Taken in 2012"));
        assert!(!html.contains(">source</a>"));
        assert!(html.contains(r#"rel="nofollow noopener">AP News</a>"#));
    }

    #[test]
    fn safe_href_keeps_web_urls_only() {
        assert_eq!(safe_href("https://reuters.com/x"), "https://reuters.com/x");
        assert_eq!(safe_href("HTTP://Example.com"), "http://example.com/");
        assert_eq!(safe_href("JavaScript:alert(1)"), "");
        assert_eq!(safe_href("/relative/path"), "");
        assert_eq!(safe_href(""), "");
    }

    #[test]
    fn explore_marks_the_active_filters() {
        let query = ExploreQuery::parse(Some("moon"), Some("image"), Some("votes"), 10).unwrap();
        let html = ExploreTemplate::new(&query, &[row("moon landing")]).render().unwrap();
        assert!(html.contains(r#"<option value="image" selected>"#));
        assert!(html.contains(r#"<option value="votes" selected>"#));
        assert!(html.contains(r#"value="moon""#));
        assert!(html.contains("moon landing"));
    }

    #[test]
    fn long_content_is_cut_on_a_char_boundary() {
        let long = "é".repeat(PREVIEW_CHARS + 5);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 1);
        assert!(p.ends_with('…'));
    }
}
