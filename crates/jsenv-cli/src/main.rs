//! jsenv CLI entry point: parse arguments, set up logging and colors,
//! dispatch the command and report errors through miette.

use clap::Parser;
use jsenv_cli::commands::GlobalOptions;
use jsenv_bundler::logging::LogLevel;
use jsenv_cli::{cli, commands, error, logger, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let global = GlobalOptions {
        cwd: args.cwd.clone(),
        profile: args.profile.clone(),
    };

    // [settings] of the config file apply before anything is logged. Load
    // errors surface again, properly reported, when the command runs.
    let settings = commands::resolve_root(global.cwd.as_deref())
        .ok()
        .and_then(|root| jsenv_config::ConfigDiscovery::new(root).load_or_default().ok())
        .and_then(|config| config.materialize_profile(global.profile.as_deref()).ok())
        .map(|config| config.settings)
        .unwrap_or_default();
    let log_level = settings.log_level.as_deref().map(str::parse::<LogLevel>);
    let no_color = args.no_color || settings.color == Some(false);
    let configured = log_level.as_ref().and_then(|level| level.as_ref().ok().copied());
    let filter = logger::filter_for(args.verbose, args.quiet, configured);
    logger::init_logger_with_filter(filter, no_color);
    ui::init_colors(if no_color { Some(false) } else { settings.color });
    if let Some(Err(message)) = log_level {
        ui::warning(&message);
    }

    let result = match args.command {
        cli::Command::Build(build_args) => commands::build_execute(build_args, &global)
            .await
            .map(|_| ()),
        cli::Command::Dev(dev_args) => commands::dev_execute(dev_args, &global).await,
    };

    result.map_err(error::cli_error_to_miette)
}
