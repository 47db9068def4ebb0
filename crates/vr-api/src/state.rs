use std::sync::Arc;

use vr_core::events::EventBus;
use vr_core::services::{AnalysisService, UserService, VoteService};
use vr_core::traits::IdentityProvider;

use crate::metrics::Metrics;

/// Request-shaping limits taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct ApiLimits {
    pub default_explore_limit: usize,
    pub max_explore_limit: usize,
    pub default_user_analyses_limit: usize,
    pub max_upload_bytes: usize,
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            default_explore_limit: 50,
            max_explore_limit: 200,
            default_user_analyses_limit: 10,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ApiLimits {
    /// Applies the default and caps at the maximum; zero is treated as one.
    pub fn explore(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_explore_limit)
            .clamp(1, self.max_explore_limit)
    }

    pub fn user_analyses(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_user_analyses_limit)
            .clamp(1, self.max_explore_limit)
    }
}

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub analyses: AnalysisService,
    pub votes: VoteService,
    pub users: UserService,
    pub identity: Arc<dyn IdentityProvider>,
    pub events: EventBus,
    pub limits: ApiLimits,
    pub metrics: Arc<Metrics>,
}
