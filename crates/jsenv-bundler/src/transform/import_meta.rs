//! `import.meta.<scenario>` flags.
//!
//! `import.meta.dev`, `.test`, `.preview` and `.prod` become `true` for the
//! active scenario and `undefined` for the others, so dead branches can be
//! dropped by a minifier and never run in the browser.

use async_trait::async_trait;
use jsenv_graph::{EditBatch, UrlInfo, UrlType};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, StaticMemberExpression};
use oxc_ast_visit::{Visit, walk};

use super::js::parse_program;
use super::text_of;
use crate::diagnostics::ParseError;
use crate::plugins::{Plugin, TransformContext, TransformOutput};
use crate::scenario::Scenario;
use crate::{Error, Result};

const NAME: &str = "jsenv:import-meta";

/// Byte ranges of `import.meta.<flag>` expressions with the scenario they
/// test.
#[derive(Debug, Default)]
struct FlagCollector {
    flags: Vec<(usize, usize, Scenario)>,
}

impl<'a> Visit<'a> for FlagCollector {
    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if let Expression::MetaProperty(meta) = &it.object {
            if meta.meta.name == "import" && meta.property.name == "meta" {
                if let Ok(scenario) = it.property.name.as_str().parse::<Scenario>() {
                    // Only the short names are flags.
                    if scenario.as_str() == it.property.name.as_str() {
                        self.flags
                            .push((it.span.start as usize, it.span.end as usize, scenario));
                    }
                }
            }
        }
        walk::walk_static_member_expression(self, it);
    }
}

/// Replace every flag in `source`. Returns `None` when there is none.
pub fn replace_flags(
    url: &str,
    source: &str,
    scenario: Scenario,
) -> std::result::Result<Option<EditBatch>, ParseError> {
    if !source.contains("import.meta") {
        return Ok(None);
    }
    let allocator = Allocator::default();
    let program = parse_program(&allocator, url, source, UrlType::JsModule)?;
    let mut collector = FlagCollector::default();
    collector.visit_program(&program);
    if collector.flags.is_empty() {
        return Ok(None);
    }
    let mut batch = EditBatch::new();
    for (start, end, flag) in collector.flags {
        batch.replace(start, end, if flag == scenario { "true" } else { "undefined" });
    }
    Ok(Some(batch))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImportMetaScenarioPlugin;

#[async_trait]
impl Plugin for ImportMetaScenarioPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn transform_types(&self) -> &[UrlType] {
        &[UrlType::JsModule]
    }

    async fn transform_url_content(
        &self,
        info: &UrlInfo,
        ctx: &mut TransformContext,
    ) -> Result<Option<TransformOutput>> {
        let source = text_of(info, NAME)?;
        let Some(batch) = replace_flags(&info.url, source, ctx.scenario)
            .map_err(|error| error.remap(info.sourcemap.as_ref()))?
        else {
            return Ok(None);
        };
        let (content, map) = batch
            .apply_with_map(source, &info.url)
            .map_err(|e| Error::plugin(NAME, e))?;
        Ok(Some(TransformOutput::new(content).with_sourcemap(Some(map))))
    }
}
