//! Config validation.
//!
//! Schema validation checks the values alone; filesystem validation also
//! checks that the files they name exist.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::build::{BuildConfig, FORMATS, SOURCEMAP_MODES};
use crate::error::{ConfigError, Result};

pub trait ConfigValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()>;
}

/// Schema-only validation, for in-memory projects.
///
/// # Example
///
/// ```
/// use jsenv_config::{BuildConfig, ConfigValidator, SchemaValidator};
///
/// let mut config = BuildConfig::default();
/// config.entry_points = vec!["main.html".into()];
///
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()> {
        if config.entry_points.is_empty() {
            return Err(ConfigError::NoEntries);
        }
        if config.entry_points.iter().any(|entry| entry.trim().is_empty()) {
            return Err(schema_error(
                "entry point specifiers cannot be empty",
                "Remove empty strings from 'entry_points'",
            ));
        }
        if !FORMATS.contains(&config.format.as_str()) {
            return Err(schema_error(
                format!("unknown format \"{}\"", config.format),
                format!("Use one of: {}", FORMATS.join(", ")),
            ));
        }
        if !SOURCEMAP_MODES.contains(&config.sourcemaps.as_str()) {
            return Err(schema_error(
                format!("unknown sourcemaps mode \"{}\"", config.sourcemaps),
                format!("Use one of: {}", SOURCEMAP_MODES.join(", ")),
            ));
        }
        if config.concurrency == 0 {
            return Err(schema_error(
                "concurrency must be at least 1",
                "Remove 'concurrency' to use the default",
            ));
        }
        if config.preserved_urls.iter().any(|rule| rule.pattern.is_empty()) {
            return Err(schema_error(
                "preserved URL patterns cannot be empty",
                "Use \"*\" to match every URL",
            ));
        }

        let mut names = HashSet::new();
        for subbuild in &config.subbuilds {
            if !names.insert(subbuild.name.as_str()) {
                return Err(schema_error(
                    format!("duplicate sub-build name \"{}\"", subbuild.name),
                    "Give every [[build.subbuilds]] a unique name",
                ));
            }
            if !is_inside(Path::new(&subbuild.directory)) {
                return Err(schema_error(
                    format!(
                        "sub-build \"{}\" directory \"{}\" leaves the build directory",
                        subbuild.name, subbuild.directory
                    ),
                    "Use a relative path such as \"worker\"",
                ));
            }
        }
        Ok(())
    }
}

/// Validation against the filesystem, for the CLI.
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &BuildConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        let project = self.root.join(&config.project_directory);
        if !project.is_dir() {
            return Err(ConfigError::ProjectDirNotFound { path: project });
        }
        for entry in &config.entry_points {
            // Query and fragment are not part of the file name.
            let file = entry.split(['?', '#']).next().unwrap_or(entry);
            let path = project.join(file.trim_start_matches("./"));
            if !path.exists() {
                return Err(ConfigError::EntryNotFound { path });
            }
        }
        if let Some(import_map) = &config.import_map {
            let path = project.join(import_map);
            if !path.is_file() {
                return Err(ConfigError::ImportMapNotFound { path });
            }
        }
        for subbuild in &config.subbuilds {
            let sub_project = project.join(&subbuild.project_directory);
            for entry in &subbuild.entry_points {
                let path = sub_project.join(entry.trim_start_matches("./"));
                if !path.exists() {
                    return Err(ConfigError::EntryNotFound { path });
                }
            }
        }
        Ok(())
    }
}

fn schema_error(message: impl Into<String>, hint: impl Into<String>) -> ConfigError {
    ConfigError::SchemaValidation {
        message: message.into(),
        hint: Some(hint.into()),
    }
}

fn is_inside(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

pub fn validate_schema(config: &BuildConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

pub fn validate_fs(config: &BuildConfig, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::SubbuildEntry;

    fn config() -> BuildConfig {
        BuildConfig {
            entry_points: vec!["main.html".into()],
            ..BuildConfig::default()
        }
    }

    fn subbuild(name: &str, directory: &str) -> SubbuildEntry {
        SubbuildEntry {
            name: name.into(),
            directory: directory.into(),
            project_directory: PathBuf::from("sw"),
            entry_points: vec!["sw.js".into()],
            minify: None,
            versioning: None,
        }
    }

    #[test]
    fn schema_validator_rejects_empty_entries() {
        let result = SchemaValidator.validate(&BuildConfig::default());
        assert!(matches!(result, Err(ConfigError::NoEntries)));
    }

    #[test]
    fn schema_validator_accepts_defaults_with_entry() {
        assert!(SchemaValidator.validate(&config()).is_ok());
    }

    #[test]
    fn schema_validator_rejects_unknown_format() {
        let mut cfg = config();
        cfg.format = "amd".into();
        let error = SchemaValidator.validate(&cfg).unwrap_err();
        assert!(error.hint().unwrap().contains("esmodule"));
    }

    #[test]
    fn schema_validator_rejects_zero_concurrency() {
        let mut cfg = config();
        cfg.concurrency = 0;
        assert!(matches!(
            SchemaValidator.validate(&cfg),
            Err(ConfigError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn schema_validator_rejects_subbuild_collisions() {
        let mut cfg = config();
        cfg.subbuilds = vec![subbuild("sw", "worker"), subbuild("sw", "worker2")];
        assert!(SchemaValidator.validate(&cfg).is_err());

        cfg.subbuilds = vec![subbuild("sw", "../worker")];
        assert!(SchemaValidator.validate(&cfg).is_err());

        cfg.subbuilds = vec![subbuild("sw", "worker")];
        assert!(SchemaValidator.validate(&cfg).is_ok());
    }
}
