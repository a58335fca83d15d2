//! Sizes, durations and the build summary table.

use console::Term;
use owo_colors::{OwoColorize, Stream::Stderr};
use std::time::Duration;

/// Human-readable size with binary units.
///
/// ```
/// use jsenv_cli::ui::format_size;
///
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

/// `50ms`, `1.50s` or `2m 5s`.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Print the written files with their sizes, then the total and the time
/// the whole build took.
pub fn print_build_summary(files: &[(String, u64)], elapsed: Duration) {
    let width = usize::from(Term::stderr().size().1).clamp(20, 80);
    let name_width = files
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0)
        .min(width.saturating_sub(14));

    eprintln!();
    for (name, size) in files {
        eprintln!(
            "  {} {:<name_width$} {}",
            "▸".if_supports_color(Stderr, |t| t.blue()),
            name,
            format_size(*size).if_supports_color(Stderr, |t| t.dimmed()),
        );
    }
    eprintln!("{}", "─".repeat(width));

    let total: u64 = files.iter().map(|(_, size)| size).sum();
    eprintln!(
        "  {} {} in {} ({} files)",
        "Total:".if_supports_color(Stderr, |t| t.bold()),
        format_size(total).if_supports_color(Stderr, |t| t.green()),
        format_duration(elapsed).if_supports_color(Stderr, |t| t.green()),
        files.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1_572_864), "1.50 MB");
        assert_eq!(format_size(2_147_483_648), "2.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_print_build_summary() {
        print_build_summary(
            &[
                ("main.html".to_string(), 312),
                ("js/main_0f3a9c21.js".to_string(), 15_234),
            ],
            Duration::from_millis(450),
        );
        print_build_summary(&[], Duration::ZERO);
    }
}
