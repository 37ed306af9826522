use tracing_subscriber::EnvFilter;

const LOG_VAR: &str = "TREEBENCH_LOG";

/// Installs a `tracing_subscriber` using `TREEBENCH_LOG` first, then `RUST_LOG`, then `info`.
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
