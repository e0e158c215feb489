//! Process-wide tracing subscriber.
//!
//! `log` records from dependencies and from modules that use the `log`
//! macros are bridged into tracing, so one filter governs both.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};

/// Installs the global subscriber. `RUST_LOG` overrides `config.level`.
///
/// Returns `false` if a subscriber was already installed, e.g. by a test
/// harness; the existing one is left in place.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = Registry::default().with(filter);
    let installed = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_current_span(true)),
        ),
        LogFormat::Text => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(true)))
        }
    }
    .is_ok();

    if installed {
        // Already set when something else bridged `log` first.
        let _ = tracing_log::LogTracer::init();
    }
    installed
}
