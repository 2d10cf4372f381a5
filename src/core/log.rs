use tracing_subscriber::{
    EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Filter used when `RUST_LOG` is unset: warnings everywhere and debug output
/// from this crate when `verbose`.
fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "warn" };
    format!("warn,stockboard={level}")
}

/// Installs the global subscriber. `RUST_LOG`, when set, replaces the
/// default filter entirely.
pub fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives(false), "warn,stockboard=warn");
        assert_eq!(default_directives(true), "warn,stockboard=debug");
    }
}
