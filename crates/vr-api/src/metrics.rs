//! Prometheus counters, exposed in text format at `/metrics`.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

type Labels = Vec<(String, String)>;

pub struct Metrics {
    registry: Registry,
    analyses_submitted: Family<Labels, Counter>,
    analyses_saved: Counter,
    classifier_failures: Counter,
    votes_recorded: Family<Labels, Counter>,
    tally_recounts: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("verity");

        let analyses_submitted = Family::<Labels, Counter>::default();
        registry.register(
            "analyses_submitted",
            "Submissions received, by content type",
            analyses_submitted.clone(),
        );
        let analyses_saved = Counter::default();
        registry.register("analyses_saved", "Analyses persisted to the store", analyses_saved.clone());
        let classifier_failures = Counter::default();
        registry.register(
            "classifier_failures",
            "Classifier calls that failed or answered unusably",
            classifier_failures.clone(),
        );
        let votes_recorded = Family::<Labels, Counter>::default();
        registry.register(
            "votes_recorded",
            "Vote changes committed, by resulting vote",
            votes_recorded.clone(),
        );
        let tally_recounts = Counter::default();
        registry.register("tally_recounts", "Tallies rebuilt from vote rows", tally_recounts.clone());

        Self {
            registry,
            analyses_submitted,
            analyses_saved,
            classifier_failures,
            votes_recorded,
            tally_recounts,
        }
    }

    pub fn submitted(&self, content_type: &str) {
        self.analyses_submitted
            .get_or_create(&vec![("content_type".to_string(), content_type.to_string())])
            .inc();
    }

    pub fn saved(&self) {
        self.analyses_saved.inc();
    }

    pub fn classifier_failed(&self) {
        self.classifier_failures.inc();
    }

    /// `vote` is the caller's vote after the change; `"none"` for a retraction.
    pub fn vote_recorded(&self, vote: &str) {
        self.votes_recorded
            .get_or_create(&vec![("vote".to_string(), vote.to_string())])
            .inc();
    }

    pub fn recounted(&self) {
        self.tally_recounts.inc();
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
