use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. Output goes to stderr so stdout only ever
/// carries command results.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
