use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Stream::Stderr};
use std::time::Duration;

/// Spinner shown while a build runs.
///
/// On a non-interactive stderr the spinner is hidden and only the final
/// message is printed, so CI logs get one line per build.
pub struct Spinner {
    pb: ProgressBar,
    interactive: bool,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let interactive = super::is_interactive();
        let pb = if interactive {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["◐", "◓", "◑", "◒", "●"]);
        pb.set_style(style);
        pb.set_message(message.to_string());
        if interactive {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        Self { pb, interactive }
    }

    pub fn set_message(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.end(format!("{} {}", "✓".if_supports_color(Stderr, |t| t.green()), message));
    }

    pub fn fail(&self, message: &str) {
        self.end(format!("{} {}", "✗".if_supports_color(Stderr, |t| t.red()), message));
    }

    fn end(&self, line: String) {
        if self.interactive {
            self.pb.finish_with_message(line);
        } else {
            self.pb.finish_and_clear();
            eprintln!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_lifecycle() {
        let spinner = Spinner::new("building");
        spinner.set_message("versioning");
        spinner.finish("built");
    }

    #[test]
    fn test_spinner_fail() {
        Spinner::new("building").fail("build failed");
    }
}
