use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the stderr log subscriber.
///
/// `RUST_LOG` takes precedence when set. Otherwise `--verbose` enables debug
/// output for this crate and the default is warnings only.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("lead_score=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .without_time()
        .try_init();
}
