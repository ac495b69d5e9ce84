//! Tracing/logging initialization and helpers.

use tracing::Subscriber;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Compose the tracing subscriber. `RUST_LOG` wins over the provided
/// default filter when set.
pub fn get_subscriber(env_filter: String) -> impl Subscriber + Send + Sync {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env_filter));
    Registry::default().with(env_filter).with(fmt::layer())
}

/// Register the subscriber as the global default, routing `log` records
/// through tracing as well. Call once at startup.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) {
    LogTracer::init().expect("Failed to set logger");
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set subscriber");
}

/// Log an error with its full source chain. Used for best-effort side
/// effects whose failures are swallowed rather than propagated.
pub fn log_error(e: anyhow::Error) {
    tracing::error!("{e:#}");
}
