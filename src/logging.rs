//! Tracing initialization.
//!
//! Log output goes to stderr so that `--json` output on stdout stays
//! machine-readable.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding filter directives, e.g.
/// `CTXR_LOG=context_relevance=debug,sqlx=warn`.
pub const LOG_ENV: &str = "CTXR_LOG";

static INIT: Once = Once::new();

/// Build the filter: `CTXR_LOG` if set and valid, else `default_level`,
/// else `info`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Safe to call more than once; only the
/// first call has any effect.
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(env_filter(default_level))
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("debug");
        init("warn");
        tracing::info!("logging initialized twice without panicking");
    }
}
