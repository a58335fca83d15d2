//! Conversion of CLI errors to miette reports.

use crate::error::{BuildError, CliError};
use miette::{MietteDiagnostic, Report};

pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        // The pipeline error is a diagnostic already: code, help, labels.
        CliError::Bundler(e) => Report::new(e),
        CliError::Build(e) => build_error_to_miette(e),
        CliError::Config(e) => {
            let mut diagnostic = MietteDiagnostic::new(format!("Configuration error: {e}"))
                .with_code("jsenv::config");
            if let Some(hint) = e.hint() {
                diagnostic = diagnostic.with_help(hint);
            }
            Report::new(diagnostic)
        }
        other => miette::miette!("{}", other),
    }
}

/// Split the `Hint:` line off a [`BuildError`] message into the help slot.
pub fn build_error_to_miette(err: BuildError) -> Report {
    let message = err.to_string();
    let diagnostic = match message.split_once("\n\nHint: ") {
        Some((message, hint)) => MietteDiagnostic::new(message).with_help(hint),
        None => MietteDiagnostic::new(message),
    };
    Report::new(diagnostic.with_code("jsenv::build"))
}
