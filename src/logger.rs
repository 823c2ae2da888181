use tracing_subscriber::EnvFilter;

use crate::Error;

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// filter.
pub fn init() -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()?;

    Ok(())
}
