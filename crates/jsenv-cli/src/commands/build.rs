//! `jsenv build`.

use jsenv_bundler::BuildResult;
use jsenv_config::validate_fs;
use std::time::Instant;

use crate::cli::BuildArgs;
use crate::commands::GlobalOptions;
use crate::config::{self, Overrides};
use crate::error::Result;
use crate::ui;

/// Build the project.
///
/// 1. Load the configuration (flags > env > file > defaults)
/// 2. Check the entry points exist
/// 3. Run the build, which writes all files or none
/// 4. Print the written files
///
/// # Errors
///
/// Configuration errors, missing files and the first failure of the build.
pub async fn execute(args: BuildArgs, global: &GlobalOptions) -> Result<BuildResult> {
    let start = Instant::now();
    let root = global.project_root()?;
    let loaded = config::load(&root, global.profile.as_deref(), &Overrides::from_build_args(&args))?;
    if let Some(file) = &loaded.file {
        ui::debug(&format!("Using {}", file.display()));
    }
    validate_fs(&loaded.config.build, &loaded.root)?;

    let options = config::build_options(&loaded.root, &loaded.config.build)?;
    let build_directory = options.build_directory.clone();

    let spinner = ui::Spinner::new(&format!(
        "Building {}",
        loaded.config.build.entry_points.join(", ")
    ));
    let result = match jsenv_bundler::build(options).await {
        Ok(result) => result,
        Err(err) => {
            spinner.fail("Build failed");
            return Err(err.into());
        }
    };
    spinner.finish(&format!("Built into {}", build_directory.display()));

    let files: Vec<(String, u64)> = result
        .build_file_contents
        .iter()
        .map(|(path, content)| (path.clone(), content.as_bytes().len() as u64))
        .collect();
    ui::print_build_summary(&files, start.elapsed());
    Ok(result)
}
