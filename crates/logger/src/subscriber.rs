use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer,
    filter::EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Install the global subscriber at `INFO`, keeping any subscriber that is
/// already installed.
pub fn init_tracing() {
    if let Err(error) = try_init_tracing(LevelFilter::INFO) {
        eprintln!("Tracing was already initialized: {error}");
    }
}

fn is_known_format(format: &str) -> bool {
    matches!(format, "" | "compact" | "json")
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` overrides `level`. `RUST_LOG_FORMAT=json` switches to JSON lines,
/// anything else gives the compact format.
pub fn try_init_tracing(level: LevelFilter) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();
    let unknown_format = !is_known_format(&log_format);

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_filter(env_filter)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()?;

    if unknown_format {
        warn!("Unknown RUST_LOG_FORMAT '{log_format}', using compact output");
    }
    Ok(())
}
