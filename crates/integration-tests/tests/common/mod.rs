//! Shared harness: the real router over an in-memory store, with the
//! classifier mocked out.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use chrono::Utc;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;
use vr_api::metrics::Metrics;
use vr_api::{ApiLimits, AppState};
use vr_auth_simple::HmacIdentity;
use vr_core::badges::BadgeRules;
use vr_core::events::EventBus;
use vr_core::models::{
    Analysis, ClassifierReport, ContentType, Evidence, Verdict, VoteTally,
};
use vr_core::services::{AnalysisService, SubmissionLimits, UserService, VoteService};
use vr_core::traits::{AnalysisRepo, IdentityProvider, MockClassifier};
use vr_db_sqlite::SqliteStore;

pub const BOUNDARY: &str = "verity-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub identity: Arc<HmacIdentity>,
    pub events: EventBus,
}

pub fn report(verdict: &str, confidence: f64) -> ClassifierReport {
    ClassifierReport {
        analysis_summary: "The quoted statistic does not appear in any official release.".into(),
        confidence_score: confidence,
        credibility_proof: vec![],
        evidence: vec![Evidence {
            source_title: "Reuters Fact Check".into(),
            source_url: "https://reuters.com/fact-check/claim".into(),
            summary: "No such statement was made.".into(),
            reputation_score: 94.0,
            similarity_score: 72.0,
        }],
        input_content: String::new(),
        input_type: "text".into(),
        verdict: verdict.into(),
    }
}

/// A classifier that always answers FAKE with 88% confidence.
pub fn fake_classifier() -> MockClassifier {
    let mut classifier = MockClassifier::new();
    classifier.expect_classify().returning(|_| Ok(report("Fake", 88.0)));
    classifier
}

pub async fn spawn_app(classifier: MockClassifier) -> TestApp {
    let store = Arc::new(SqliteStore::in_memory().await.expect("in-memory store"));
    let identity = Arc::new(
        HmacIdentity::new(&SecretString::from("integration-test-secret".to_string())).expect("identity"),
    );
    let events = EventBus::default();
    let badges = BadgeRules::default();
    let limits = ApiLimits {
        max_upload_bytes: 1024 * 1024,
        ..ApiLimits::default()
    };

    let state = AppState {
        analyses: AnalysisService::new(
            store.clone(),
            store.clone(),
            Arc::new(classifier),
            events.clone(),
            badges.clone(),
            SubmissionLimits { max_upload_bytes: limits.max_upload_bytes, explore_window: 200 },
        ),
        votes: VoteService::new(store.clone(), store.clone(), events.clone(), badges.clone()),
        users: UserService::new(store.clone(), events.clone(), badges),
        identity: identity.clone(),
        events: events.clone(),
        limits,
        metrics: Arc::new(Metrics::new()),
    };

    TestApp { router: vr_api::router(state), store, identity, events }
}

impl TestApp {
    pub fn token(&self, uid: &str) -> String {
        self.identity.issue(uid)
    }

    pub async fn call(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("router is infallible")
    }

    /// Sends a request and decodes the JSON body (`Value::Null` when empty).
    pub async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.call(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        if bytes.is_empty() {
            return (status, Value::Null);
        }
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|e| panic!("non-JSON body ({e}): {}", String::from_utf8_lossy(&bytes)));
        (status, value)
    }

    pub async fn text(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.call(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Stores an analysis directly, bypassing the classifier.
    pub async fn seed(&self, author: &str, content: &str, kind: ContentType, confidence: f64) -> Analysis {
        let analysis = Analysis {
            id: Uuid::now_v7(),
            user_id: author.into(),
            content_type: kind,
            content: content.into(),
            verdict: Verdict::Fake,
            confidence_score: confidence,
            summary: format!("Checked: {content}"),
            evidence: vec![],
            credibility_proof: vec![],
            sources: vec![],
            community_votes: VoteTally::default(),
            created_at: Utc::now(),
        };
        self.store.save_analysis(&analysis).await.expect("seed analysis");
        analysis
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

pub fn authed(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

pub fn authed_json(method: Method, uri: &str, token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File { name: &'a str, file_name: &'a str, mime: &'a str, data: &'a [u8] },
}

pub fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
                );
            }
            Part::File { name, file_name, mime, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {mime}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn submit_request(token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::post("/api/analyses").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(multipart(parts))).expect("request")
}
