//! Tracing setup for the host
//!
//! Logs go to stderr so they never interleave with the rendered view on
//! stdout. `SPARKS_LOG` takes standard `EnvFilter` directives.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SPARKS_LOG";
pub const DEFAULT_DIRECTIVES: &str = "sparks=info,sparklet_core=warn";

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .try_init()?;
    Ok(())
}
