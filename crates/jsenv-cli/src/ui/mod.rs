//! Terminal output: status lines, a spinner for the build and the summary
//! table printed once files are written.
//!
//! Everything goes to stderr so that stdout stays free for piping.

mod format;
mod messages;
mod spinner;

pub use format::{format_duration, format_size, print_build_summary};
pub use messages::{debug, error, info, success, warning};
pub use spinner::Spinner;

/// Whether a CI provider is running us.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS", "BUILDKITE"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Color decision from the environment and the terminal.
///
/// `NO_COLOR` wins over `FORCE_COLOR`; without either, colors follow
/// whether stderr is attended.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Apply the color decision to `console` and `owo-colors` output.
///
/// `force` comes from the `--no-color` flag or the `color` setting.
pub fn init_colors(force: Option<bool>) {
    let enabled = force.unwrap_or_else(should_use_color);
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
    owo_colors::set_override(enabled);
}

/// Spinners redraw in place, which only makes sense on an interactive
/// terminal outside CI.
pub fn is_interactive() -> bool {
    !is_ci() && console::user_attended_stderr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "CI",
            "GITHUB_ACTIONS",
            "GITLAB_CI",
            "CIRCLECI",
            "TRAVIS",
            "BUILDKITE",
            "NO_COLOR",
            "FORCE_COLOR",
        ] {
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_is_ci_with_github_actions() {
        clear_env();
        unsafe { std::env::set_var("GITHUB_ACTIONS", "true") };
        assert!(is_ci());
        assert!(!is_interactive());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_no_color_overrides_force_color() {
        clear_env();
        unsafe {
            std::env::set_var("NO_COLOR", "1");
            std::env::set_var("FORCE_COLOR", "1");
        }
        assert!(!should_use_color());
        unsafe { std::env::remove_var("NO_COLOR") };
        assert!(should_use_color());
        clear_env();
    }
}
