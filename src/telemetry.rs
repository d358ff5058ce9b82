use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialises JSON structured logging on stdout.
///
/// The level is taken from `RUST_LOG`, defaulting to `info`. Returns `false`
/// if a global subscriber was already installed.
pub fn init_telemetry() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_initialization_is_refused() {
        init_telemetry();
        assert!(!init_telemetry());
    }
}
