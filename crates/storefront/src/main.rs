//! Farmacia storefront host.
//!
//! Loads configuration, rehydrates the cart and profile stores from the data
//! directory, starts the auth bridge and keeps it running until shutdown.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use farmacia_storefront::backend::BackendClient;
use farmacia_storefront::catalog::Catalog;
use farmacia_storefront::config::StorefrontConfig;
use farmacia_storefront::error::AppError;
use farmacia_storefront::services::notifications::TracingNotifier;
use farmacia_storefront::state::StorefrontState;
use farmacia_storefront::storage::FileStore;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "farmacia_storefront=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(config).await {
        e.capture();
        std::process::exit(1);
    }
}

async fn run(config: StorefrontConfig) -> Result<(), AppError> {
    let store = Arc::new(FileStore::open(&config.data_dir)?);
    tracing::info!(dir = %store.dir().display(), "Data directory ready");

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)?,
        None => {
            tracing::warn!("No catalog configured, persisted cart lines will be dropped");
            Catalog::default()
        }
    };

    let backend = BackendClient::new(&config.backend, store.clone())?;
    let state = StorefrontState::new(
        catalog,
        store,
        Arc::new(backend),
        Arc::new(TracingNotifier),
    );

    state.start().await;
    tracing::info!(
        logged_in = state.users().is_logged_in(),
        cart_items = state.cart().item_count(),
        "Storefront session ready"
    );

    shutdown_signal().await;
    state.stop();
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping auth bridge");
}
