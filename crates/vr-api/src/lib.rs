//! # vr-api
//!
//! The HTTP surface of Verity: routing, extractors, error mapping, metrics
//! and the live event stream. Handlers stay thin and call into
//! `vr_core::services`.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

pub use error::ApiError;
pub use state::{ApiLimits, AppState};

/// Multipart framing and text fields on top of the file itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.limits.max_upload_bytes + UPLOAD_OVERHEAD_BYTES;

    let api = Router::new()
        .route(
            "/analyses",
            post(handlers::analyses::submit)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(handlers::analyses::explore),
        )
        .route("/analyses/{id}", get(handlers::analyses::get_one))
        .route(
            "/analyses/{id}/vote",
            get(handlers::votes::current)
                .post(handlers::votes::cast)
                .delete(handlers::votes::clear),
        )
        .route("/analyses/{id}/recount", post(handlers::votes::recount))
        .route(
            "/users/me",
            get(handlers::users::me)
                .put(handlers::users::update_me)
                .delete(handlers::users::delete_me),
        )
        .route(
            "/users/me/settings",
            get(handlers::users::settings).put(handlers::users::update_settings),
        )
        .route("/users/{uid}", get(handlers::users::public_profile))
        .route("/users/{uid}/analyses", get(handlers::users::analyses))
        .route("/events", get(handlers::events::stream));

    let pages = Router::new()
        .route("/analyses/{id}/report", get(handlers::pages::report))
        .route("/explore", get(handlers::pages::explore));

    let router = Router::new()
        .route("/healthz", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .nest("/api", api)
        .merge(pages)
        .fallback(handlers::not_found)
        .with_state(state);

    middleware::apply(router)
}
