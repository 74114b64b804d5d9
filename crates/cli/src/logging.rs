use tracing_subscriber::EnvFilter;

/// Initialise logging on stderr, keeping stdout for command output.
///
/// Without `--verbose` only warnings are shown and `RUST_LOG` is ignored.
/// With it the level is `debug` unless `RUST_LOG` says otherwise.
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}
