//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events. Applications that have no
//! subscriber of their own can call [`init_tracing`] once at startup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the filter: `RUST_LOG` when set, the configured level otherwise.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a global subscriber with a plain or JSON `fmt` layer.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one is left untouched.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let (plain, json) = if config.json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(plain)
        .with(json)
        .try_init()
        .is_ok()
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
