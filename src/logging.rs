//! Tracing subscriber setup
//!
//! Human-readable or JSON lines on stderr, so stdout stays free for command
//! output such as pull progress.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "laim=info";

/// Install the global subscriber
///
/// `RUST_LOG` overrides the default filter; `verbose` raises the default to
/// `laim=debug`.
pub fn init_logging(json: bool, verbose: bool) -> Result<()> {
    let default = if verbose { "laim=debug" } else { DEFAULT_FILTER };
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}
