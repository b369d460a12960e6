//! Diagnostic logging via tracing-subscriber.
//!
//! Output goes to stderr so it never mixes with command output. The filter
//! comes from `RAPPORT_LOG` using `EnvFilter` directive syntax.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "RAPPORT_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}
