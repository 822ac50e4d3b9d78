use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides
/// `default_level` when set. Calling this twice is harmless.
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init("debug");
        init("info");
        tracing::info!("logging initialised");
    }
}
