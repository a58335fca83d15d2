//! Plugin contract.
//!
//! A plugin is a set of optional hooks. Every hook has a no-op default, so a
//! plugin implements only the stages it cares about:
//!
//! | hook                    | stage    | first `Some` wins |
//! |-------------------------|----------|-------------------|
//! | `resolve_reference`     | resolve  | yes               |
//! | `redirect_reference`    | resolve  | no (chained)      |
//! | `fetch_url_content`     | fetch    | yes               |
//! | `transform_url_content` | cook     | no (chained)      |
//! | `bundle`                | build    | no (per type)     |
//! | `finalize_url_content`  | finalize | no (chained)      |
//!
//! Hooks run in [`PluginPhase`] order, then registration order, and only for
//! the scenarios returned by [`Plugin::applies_during`].

pub mod context;
pub mod registry;

pub use context::{
    Bundle, BundleContext, FetchContext, FetchedContent, FinalizeContext, ResolveContext,
    TransformContext, TransformOutput,
};
pub use registry::{PluginList, PluginPhase, PluginRegistry};

use async_trait::async_trait;
use jsenv_graph::url::Url;
use jsenv_graph::{Reference, UrlInfo, UrlType};

use crate::Result;
use crate::scenario::ScenarioSet;

#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn phase(&self) -> PluginPhase {
        PluginPhase::Transform
    }

    fn applies_during(&self) -> ScenarioSet {
        ScenarioSet::all()
    }

    /// Turn a specifier into a URL. Returning `Ok(None)` defers to the next
    /// plugin and finally to the default resolution.
    fn resolve_reference(
        &self,
        _reference: &Reference,
        _ctx: &ResolveContext<'_>,
    ) -> Result<Option<Url>> {
        Ok(None)
    }

    /// Point an already resolved reference somewhere else.
    fn redirect_reference(
        &self,
        _reference: &Reference,
        _url: &Url,
        _ctx: &ResolveContext<'_>,
    ) -> Option<Url> {
        None
    }

    /// Provide the content of a URL instead of the default loaders.
    async fn fetch_url_content(
        &self,
        _info: &UrlInfo,
        _ctx: &FetchContext<'_>,
    ) -> Result<Option<FetchedContent>> {
        Ok(None)
    }

    /// Types `transform_url_content` is called for.
    fn transform_types(&self) -> &[UrlType] {
        &[]
    }

    async fn transform_url_content(
        &self,
        _info: &UrlInfo,
        _ctx: &mut TransformContext,
    ) -> Result<Option<TransformOutput>> {
        Ok(None)
    }

    /// Types `bundle` is called for.
    fn bundle_types(&self) -> &[UrlType] {
        &[]
    }

    /// Merge same-type nodes. Each returned bundle replaces its sources.
    async fn bundle(&self, _nodes: &[UrlInfo], _ctx: &BundleContext<'_>) -> Result<Vec<Bundle>> {
        Ok(Vec::new())
    }

    /// Last chance to change text content before it is served or written.
    async fn finalize_url_content(
        &self,
        _info: &UrlInfo,
        _content: &str,
        _ctx: &FinalizeContext<'_>,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}
