//! Logging configuration

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{HarnessError, Result};

/// Initialize logging with the specified level. `RUST_LOG` takes precedence.
pub fn init(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| HarnessError::Config(format!("failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| HarnessError::Config(format!("failed to init logging: {e}")))?;
    }

    Ok(())
}
