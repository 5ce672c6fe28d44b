use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr `tracing` subscriber.
///
/// `RUST_LOG` takes priority. Without it the level is `warn`, or `debug` when
/// `verbose` is set; operator-facing progress is printed separately.
pub fn init(verbose: bool) -> Result<()> {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}
