//! `jsenv dev`.
//!
//! Runs the server in a task while the main loop forwards file changes to
//! the kitchen and reload events to the browsers, until Ctrl+C.

use jsenv_bundler::dev::DevKitchen;
use std::sync::Arc;
use tokio::signal;

use crate::cli::DevArgs;
use crate::commands::GlobalOptions;
use crate::config::{self, Overrides};
use crate::dev::{DevServer, DevServerState, FileChange, FileWatcher, SharedState};
use crate::error::Result;
use crate::ui;

/// Serve the project until interrupted.
///
/// # Errors
///
/// Configuration errors, a missing project directory and watcher failures.
/// Bind failures of the server end the loop with a warning.
pub async fn execute(args: DevArgs, global: &GlobalOptions) -> Result<()> {
    let root = global.project_root()?;
    let loaded = config::load(&root, global.profile.as_deref(), &Overrides::from_dev_args(&args))?;
    let dev_config = loaded.config.dev.clone();

    let options = config::dev_options(&loaded.root, &loaded.config.build, &dev_config)?;
    let project_directory = options.project_directory.clone();
    let kitchen = DevKitchen::new(options)?;
    let state: SharedState = Arc::new(DevServerState::new(kitchen));

    let mut roots = vec![project_directory.clone()];
    roots.extend(dev_config.watch_paths.iter().map(|path| loaded.root.join(path)));
    let (watcher, mut changes) =
        FileWatcher::new(roots, dev_config.ignore.clone(), dev_config.debounce_ms)?;
    for root in watcher.roots() {
        ui::info(&format!("Watching {}", root.display()));
    }

    let server = DevServer::new(dev_config.clone(), state.clone());
    let url = server.server_url();
    let mut server_handle = tokio::spawn(async move {
        if let Err(e) = server.start().await {
            ui::error(&e.to_string());
        }
    });

    if dev_config.open {
        open_browser(&url);
    }
    ui::info("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                handle_file_change(change, &state).await;
            }
            _ = signal::ctrl_c() => {
                ui::info("Shutting down development server...");
                break;
            }
            _ = &mut server_handle => {
                ui::warning("Server task completed unexpectedly");
                break;
            }
        }
    }

    server_handle.abort();
    ui::success("Development server stopped");
    Ok(())
}

/// Invalidate the graph below the changed file and tell the browsers.
pub async fn handle_file_change(change: FileChange, state: &SharedState) {
    let Some(event) = state.file_changed(change.path()) else {
        tracing::debug!(path = %change.path().display(), "change outside the served graph");
        return;
    };
    ui::info(&format!("Changed {}", change.path().display()));
    state.broadcast(&event).await;
}

fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    match result {
        Ok(_) => ui::info(&format!("Opened browser at {url}")),
        Err(e) => ui::warning(&format!("Failed to open browser: {e}")),
    }
}
