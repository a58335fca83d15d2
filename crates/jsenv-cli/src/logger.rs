//! Tracing subscriber for the CLI.
//!
//! The filter is picked in this order:
//! 1. `--verbose`: debug for the jsenv crates
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`
//! 4. the `log_level` setting of the config file
//! 5. info for the jsenv crates

use jsenv_bundler::logging::LogLevel;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: &[&str] = &["jsenv", "jsenv_bundler", "jsenv_graph", "jsenv_config", "jsenv_cli"];

/// Filter directives giving every jsenv crate `level`.
pub fn crate_directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Resolve the filter from the flags, the environment and the configured
/// level. `silent` turns logging off.
pub fn filter_for(verbose: bool, quiet: bool, configured: Option<LogLevel>) -> EnvFilter {
    if verbose {
        return EnvFilter::new(crate_directives(LogLevel::Debug.as_filter()));
    }
    if quiet {
        return EnvFilter::new(crate_directives(LogLevel::Error.as_filter()));
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(crate_directives(configured.unwrap_or_default().as_filter()))
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet, None), no_color);
}

pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_directives() {
        let directives = crate_directives("debug");
        assert!(directives.starts_with("jsenv=debug,"));
        assert!(directives.contains("jsenv_bundler=debug"));
        assert!(directives.ends_with("jsenv_cli=debug"));
    }

    #[test]
    fn test_flags_win_over_configured_level() {
        let verbose = filter_for(true, false, Some(LogLevel::Error)).to_string();
        assert!(verbose.contains("jsenv_bundler=debug"));
        let quiet = filter_for(false, true, Some(LogLevel::Debug)).to_string();
        assert!(quiet.contains("jsenv_bundler=error"));
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logger(false, true, true);
        init_logger(true, false, true);
    }
}
