//! Dev autoreload client injection.

use async_trait::async_trait;
use jsenv_graph::{UrlInfo, UrlType};

use super::html::scan_tags;
use crate::Result;
use crate::plugins::{FinalizeContext, Plugin, PluginPhase};
use crate::scenario::{Scenario, ScenarioSet};

const NAME: &str = "jsenv:autoreload";

/// Server path of the autoreload client.
pub const AUTORELOAD_CLIENT_PATH: &str = "/__jsenv__/autoreload.js";

/// Attribute marking the injected script.
pub const AUTORELOAD_MARKER: &str = "data-jsenv-autoreload";

/// Insert the autoreload client `<script>` into `html`.
///
/// The script goes right after `<meta charset>` when there is one (the
/// charset declaration must stay first), otherwise at the start of `<head>`,
/// otherwise at the very beginning. Returns `None` when the client is
/// already present.
pub fn inject_autoreload(html: &str) -> Option<String> {
    let tags = scan_tags(html);
    if tags
        .iter()
        .any(|tag| tag.name == "script" && tag.has_attribute(AUTORELOAD_MARKER))
    {
        return None;
    }
    let position = tags
        .iter()
        .find(|tag| tag.name == "meta" && tag.has_attribute("charset"))
        .or_else(|| tags.iter().find(|tag| tag.name == "head"))
        .map(|tag| tag.open_end)
        .unwrap_or(0);
    let script = format!(
        "\n<script type=\"module\" src=\"{AUTORELOAD_CLIENT_PATH}\" {AUTORELOAD_MARKER}></script>"
    );
    let mut output = String::with_capacity(html.len() + script.len());
    output.push_str(&html[..position]);
    output.push_str(&script);
    output.push_str(&html[position..]);
    Some(output)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AutoreloadPlugin;

#[async_trait]
impl Plugin for AutoreloadPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::PostProcess
    }

    fn applies_during(&self) -> ScenarioSet {
        ScenarioSet::only(&[Scenario::Dev])
    }

    async fn finalize_url_content(
        &self,
        info: &UrlInfo,
        content: &str,
        _ctx: &FinalizeContext<'_>,
    ) -> Result<Option<String>> {
        if info.url_type != UrlType::Html {
            return Ok(None);
        }
        Ok(inject_autoreload(content))
    }
}
