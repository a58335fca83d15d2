use figment::{
    Figment,
    providers::{Env, Serialized},
};
use jsenv_config::{ConfigDiscovery, JsenvConfig};
use serde_json::{Map, Value, json};
use std::path::Path;

use crate::cli::{BuildArgs, DevArgs};
use crate::config::LoadedConfig;
use crate::error::Result;

pub const ENV_PREFIX: &str = "JSENV_";

/// Values given on the command line, as a partial configuration.
///
/// Only flags that were actually passed are present, so that unset flags
/// do not mask the file or the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    build: Map<String, Value>,
    dev: Map<String, Value>,
}

impl Overrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_build_args(args: &BuildArgs) -> Self {
        let mut build = Map::new();
        if !args.entries.is_empty() {
            build.insert("entry_points".into(), json!(args.entries));
        }
        if let Some(out_dir) = &args.out_dir {
            build.insert("build_directory".into(), json!(out_dir));
        }
        if let Some(format) = args.format {
            build.insert("format".into(), json!(format.as_config_str()));
        }
        if let Some(sourcemaps) = args.sourcemaps {
            build.insert("sourcemaps".into(), json!(sourcemaps.as_config_str()));
        }
        if args.minify {
            build.insert("minify".into(), json!(true));
        }
        if args.no_versioning {
            build.insert("versioning".into(), json!(false));
        }
        if let Some(base) = &args.base {
            build.insert("base".into(), json!(base));
        }
        if args.cache {
            build.insert("filesystem_cache".into(), json!(true));
        }
        Self {
            build,
            dev: Map::new(),
        }
    }

    pub fn from_dev_args(args: &DevArgs) -> Self {
        let mut dev = Map::new();
        if let Some(port) = args.port {
            dev.insert("port".into(), json!(port));
        }
        if let Some(host) = &args.host {
            dev.insert("host".into(), json!(host));
        }
        if args.no_autoreload {
            dev.insert("autoreload".into(), json!(false));
        }
        if args.open {
            dev.insert("open".into(), json!(true));
        }
        Self {
            build: Map::new(),
            dev,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.build.is_empty() && self.dev.is_empty()
    }

    fn to_value(&self) -> Value {
        let mut root = Map::new();
        if !self.build.is_empty() {
            root.insert("build".into(), Value::Object(self.build.clone()));
        }
        if !self.dev.is_empty() {
            root.insert("dev".into(), Value::Object(self.dev.clone()));
        }
        Value::Object(root)
    }
}

/// Load the configuration of the project at `root`.
///
/// # Errors
///
/// Unreadable or malformed files, an unknown profile and values that no
/// longer fit the configuration types once every layer is merged.
pub fn load(root: &Path, profile: Option<&str>, overrides: &Overrides) -> Result<LoadedConfig> {
    let discovery = ConfigDiscovery::new(root);
    let file = discovery.find();
    let mut base = discovery.load_or_default()?.materialize_profile(profile)?;
    // Applied above; the layers below only deal with build, dev and settings.
    base.profiles.clear();

    let config: JsenvConfig = Figment::new()
        .merge(Serialized::defaults(base))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["profile"]))
        .merge(Serialized::defaults(overrides.to_value()))
        .extract()?;

    tracing::debug!(
        root = %root.display(),
        file = ?file,
        profile = ?profile,
        "configuration loaded"
    );
    Ok(LoadedConfig {
        root: root.to_path_buf(),
        file,
        config,
    })
}
