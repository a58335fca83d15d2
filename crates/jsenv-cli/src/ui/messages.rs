//! One-line status messages.

use owo_colors::{OwoColorize, Stream::Stderr};

pub fn success(message: &str) {
    eprintln!("{} {}", "✓".if_supports_color(Stderr, |t| t.green().bold().to_string()), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".if_supports_color(Stderr, |t| t.blue().bold().to_string()), message);
}

pub fn warning(message: &str) {
    eprintln!(
        "{} {}",
        "⚠".if_supports_color(Stderr, |t| t.yellow().bold().to_string()),
        message.if_supports_color(Stderr, |t| t.yellow())
    );
}

pub fn error(message: &str) {
    eprintln!(
        "{} {}",
        "✗".if_supports_color(Stderr, |t| t.red().bold().to_string()),
        message.if_supports_color(Stderr, |t| t.red())
    );
}

/// Printed only when `RUST_LOG` is set.
pub fn debug(message: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        eprintln!(
            "{} {}",
            "◆".if_supports_color(Stderr, |t| t.dimmed()),
            message.if_supports_color(Stderr, |t| t.dimmed())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages() {
        success("built 3 files");
        info("watching /p");
        warning("cache entry discarded");
        error("no content for file:///p/missing.js");
        debug("cooked file:///p/main.js");
    }
}
