//! # Verity Binary
//!
//! Assembles the store, classifier and identity plugins chosen at compile
//! time and serves the HTTP API until Ctrl-C or SIGTERM.

#[cfg(not(all(feature = "db-sqlite", feature = "classifier-http", feature = "auth-simple")))]
compile_error!("verity needs a store, a classifier and an identity plugin; enable the default features");

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vr_api::{ApiLimits, AppState};
use vr_config::{LogFormat, LogSettings, Settings};
use vr_core::badges::BadgeRules;
use vr_core::events::EventBus;
use vr_core::services::{AnalysisService, SubmissionLimits, UserService, VoteService};

use vr_auth_simple::HmacIdentity;
use vr_classifier_http::HttpClassifier;
use vr_db_sqlite::SqliteStore;

fn init_tracing(log: &LogSettings) {
    // RUST_LOG wins over the configured filter.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (settings, dotenv) = Settings::load().context("loading configuration")?;
    init_tracing(&settings.log);
    dotenv.log();

    // 1. Store
    let store = Arc::new(
        SqliteStore::connect(&settings.database.url, settings.database.max_connections)
            .await
            .context("opening the database")?,
    );

    // 2. Classifier
    let classifier = Arc::new(
        HttpClassifier::new(
            &settings.classifier.base_url,
            Duration::from_secs(settings.classifier.timeout_secs),
        )
        .context("building the classifier client")?,
    );
    info!(endpoint = classifier.endpoint(), "classifier configured");

    // 3. Identity
    let identity = Arc::new(HmacIdentity::new(&settings.auth.token_secret).context("loading the token secret")?);

    // 4. Services over the shared ports
    let events = EventBus::default();
    let badges = BadgeRules {
        early_adopter_cutoff: settings.badges.early_adopter_cutoff,
    };
    let limits = SubmissionLimits {
        max_upload_bytes: settings.classifier.max_upload_bytes,
        explore_window: settings.explore.max_limit as i64,
    };
    let state = AppState {
        analyses: AnalysisService::new(
            store.clone(),
            store.clone(),
            classifier,
            events.clone(),
            badges.clone(),
            limits,
        ),
        votes: VoteService::new(store.clone(), store.clone(), events.clone(), badges.clone()),
        users: UserService::new(store.clone(), events.clone(), badges),
        identity,
        events,
        limits: ApiLimits {
            default_explore_limit: settings.explore.default_limit,
            max_explore_limit: settings.explore.max_limit,
            max_upload_bytes: settings.classifier.max_upload_bytes,
            ..ApiLimits::default()
        },
        metrics: Arc::new(vr_api::metrics::Metrics::new()),
    };

    let address = settings.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, "verity listening");

    axum::serve(listener, vr_api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    store.close().await;
    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C, shutting down"),
            Err(e) => {
                error!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM, shutting down");
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
