//! Nested builds whose output the parent build references.
//!
//! Sub-builds run before the parent graph is walked, each with its own
//! session. Their files are exposed to the parent as virtual files at the
//! place they will be written, and references to their entry points are
//! redirected there.

use async_trait::async_trait;
use futures::future::{BoxFuture, join_all};
use jsenv_graph::url::{Url, file_url_to_path};
use jsenv_graph::{Content, Reference, UrlInfo, UrlType, content_type};
use path_clean::PathClean;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::sync::Arc;

use super::options::BuildOptions;
use super::output::BuildResult;
use crate::plugins::{FetchContext, FetchedContent, Plugin, PluginPhase, ResolveContext};
use crate::runtime::JsenvRuntime;
use crate::scenario::ScenarioSet;
use crate::{Error, Result};

/// A nested build written under `build_relative_dir` of the parent build
/// directory.
#[derive(Debug, Clone)]
pub struct SubbuildConfig {
    pub name: String,
    pub options: BuildOptions,
    pub build_relative_dir: String,
}

impl SubbuildConfig {
    pub fn new(
        name: impl Into<String>,
        build_relative_dir: impl Into<String>,
        options: BuildOptions,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            build_relative_dir: build_relative_dir.into(),
        }
    }

    /// The directory must stay inside the parent build directory. The
    /// nested options are checked when the sub-build runs, once its build
    /// directory is known.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig("sub-build name cannot be empty".into()));
        }
        let dir = Path::new(&self.build_relative_dir);
        let escapes = dir.is_absolute()
            || dir
                .clean()
                .components()
                .any(|component| !matches!(component, Component::Normal(_)));
        if self.build_relative_dir.is_empty() || escapes {
            return Err(Error::InvalidConfig(format!(
                "sub-build \"{}\": directory \"{}\" must be a relative path inside the build directory",
                self.name, self.build_relative_dir
            )));
        }
        Ok(())
    }

    fn prefix(&self) -> String {
        self.build_relative_dir.trim_matches('/').to_string()
    }
}

/// Output of the sub-builds, ready to splice into the parent build.
#[derive(Debug, Default)]
pub(crate) struct SubbuildOutput {
    /// Sub-build results with the directory they go to.
    pub results: Vec<(String, BuildResult)>,
    /// Sub-build entry URL to the file URL of its build output.
    pub redirects: BTreeMap<String, String>,
    /// Build file URL to its path relative to the parent build directory.
    pub files: BTreeMap<String, String>,
}

/// Run every sub-build concurrently. The first failure, in configuration
/// order, fails the parent.
pub(crate) async fn run_subbuilds(
    subbuilds: &[SubbuildConfig],
    parent: &BuildOptions,
    build_url: &Url,
    runtime: &JsenvRuntime,
) -> Result<SubbuildOutput> {
    let mut output = SubbuildOutput::default();
    if subbuilds.is_empty() {
        return Ok(output);
    }

    let runs: Vec<BoxFuture<'static, Result<BuildResult>>> = subbuilds
        .iter()
        .map(|subbuild| {
            let mut options = subbuild.options.clone();
            options.build_directory = parent.build_directory.join(subbuild.prefix());
            options.write = false;
            if options.runtime.is_none() {
                options.runtime = parent.runtime.clone();
            }
            tracing::info!(name = %subbuild.name, dir = %subbuild.build_relative_dir, "starting sub-build");
            super::build(options)
        })
        .collect();
    let results = join_all(runs).await;

    for (subbuild, result) in subbuilds.iter().zip(results) {
        let result = result.map_err(|source| Error::SubbuildFailed {
            name: subbuild.name.clone(),
            source: Box::new(source),
        })?;
        let prefix = subbuild.prefix();
        let sub_build_url = build_url
            .join(&format!("{prefix}/"))
            .map_err(|e| Error::InvalidConfig(format!("sub-build \"{}\": {e}", subbuild.name)))?;
        for (path, content) in &result.build_file_contents {
            let Ok(file_url) = sub_build_url.join(path) else {
                continue;
            };
            if let Ok(file_path) = file_url_to_path(&file_url) {
                runtime.add_virtual_file(file_path, content.as_bytes().to_vec());
            }
            output
                .files
                .insert(file_url.to_string(), format!("{prefix}/{path}"));
        }
        for (entry_url, path) in &result.entry_points {
            if let Ok(file_url) = sub_build_url.join(path) {
                output.redirects.insert(entry_url.clone(), file_url.to_string());
            }
        }
        tracing::info!(
            name = %subbuild.name,
            files = result.build_file_contents.len(),
            "sub-build done"
        );
        output.results.push((prefix, result));
    }
    Ok(output)
}

/// Points references to sub-build entry points at their build output and
/// serves that output as opaque assets.
#[derive(Debug)]
pub(crate) struct SubbuildRedirectPlugin {
    redirects: FxHashMap<String, String>,
    targets: FxHashSet<String>,
}

impl SubbuildRedirectPlugin {
    pub fn new(output: &SubbuildOutput) -> Self {
        Self {
            redirects: output
                .redirects
                .iter()
                .map(|(from, to)| (from.clone(), to.clone()))
                .collect(),
            targets: output.files.keys().cloned().collect(),
        }
    }

    pub fn into_shared(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }
}

#[async_trait]
impl Plugin for SubbuildRedirectPlugin {
    fn name(&self) -> &str {
        "jsenv:subbuild"
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::Virtual
    }

    fn applies_during(&self) -> ScenarioSet {
        ScenarioSet::building()
    }

    fn redirect_reference(
        &self,
        _reference: &Reference,
        url: &Url,
        _ctx: &ResolveContext<'_>,
    ) -> Option<Url> {
        let target = self.redirects.get(url.as_str())?;
        Url::parse(target).ok()
    }

    async fn fetch_url_content(
        &self,
        info: &UrlInfo,
        ctx: &FetchContext<'_>,
    ) -> Result<Option<FetchedContent>> {
        if !self.targets.contains(&info.url) {
            return Ok(None);
        }
        let url = Url::parse(&info.url)
            .map_err(|e| Error::plugin(self.name(), format!("{}: {e}", info.url)))?;
        let path = file_url_to_path(&url).map_err(|e| Error::plugin(self.name(), e))?;
        let bytes = ctx.runtime.read_file(&path).await?;
        let content_type = content_type::from_url(&url);
        let content = Content::from_bytes(bytes, content_type::is_text(content_type));
        Ok(Some(
            FetchedContent::new(content, content_type).with_url_type(UrlType::Asset),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_directory() {
        let options = BuildOptions::new("/p/sw", "/ignored").entry_point("sw.js");
        assert!(SubbuildConfig::new("sw", "sw", options.clone()).validate().is_ok());
        assert!(SubbuildConfig::new("sw", "nested/sw/", options.clone()).validate().is_ok());
        assert!(SubbuildConfig::new("sw", "../sw", options.clone()).validate().is_err());
        assert!(SubbuildConfig::new("sw", "/abs", options.clone()).validate().is_err());
        assert!(SubbuildConfig::new("sw", "", options.clone()).validate().is_err());
        assert!(SubbuildConfig::new(" ", "sw", options).validate().is_err());
    }

    #[test]
    fn test_redirects_only_entry_points() {
        let mut output = SubbuildOutput::default();
        output.redirects.insert(
            "file:///p/sw/sw.js".into(),
            "file:///dist/worker/sw_1a2b3c4d.js".into(),
        );
        output.files.insert(
            "file:///dist/worker/sw_1a2b3c4d.js".into(),
            "worker/sw_1a2b3c4d.js".into(),
        );
        let plugin = SubbuildRedirectPlugin::new(&output);
        let project_url = Url::parse("file:///p/").unwrap();
        let ctx = ResolveContext {
            scenario: crate::scenario::Scenario::Prod,
            project_url: &project_url,
        };
        let reference = Reference::new("file:///p/main.js", "./sw/sw.js", jsenv_graph::ReferenceKind::JsServiceWorker);
        let redirected = plugin.redirect_reference(&reference, &Url::parse("file:///p/sw/sw.js").unwrap(), &ctx);
        assert_eq!(redirected.unwrap().as_str(), "file:///dist/worker/sw_1a2b3c4d.js");
        assert!(
            plugin
                .redirect_reference(&reference, &Url::parse("file:///p/other.js").unwrap(), &ctx)
                .is_none()
        );
    }
}
