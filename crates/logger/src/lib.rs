use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Where the process writes its diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Interactive operator commands: compact lines, no timestamps.
    Terminal,
    /// Detached monitoring workers whose stdout lands in a log file.
    Worker,
}

pub fn init(output: Output) {
    initialize_tracing(LevelFilter::INFO, output);
}

/// Initialize tracing subscriber for the given output profile.
fn initialize_tracing(level: LevelFilter, output: Output) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT")
        .inspect_err(|error| {
            warn!("Failed to read RUST_LOG_FORMAT, falling back to default: {error}")
        })
        .unwrap_or_default();

    let log_layer = match (log_format.as_str(), output) {
        ("json", _) => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        (_, Output::Worker) => tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
        (_, Output::Terminal) => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(log_layer).try_init();
}
