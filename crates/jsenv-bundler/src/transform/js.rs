//! JavaScript reference discovery.
//!
//! Parses with oxc and records every statically analyzable specifier:
//! static imports and re-exports, `import()` with a string argument,
//! `new URL(x, import.meta.url)`, worker constructors, service worker
//! registration and `importScripts`. Non-literal specifiers are left alone.

use async_trait::async_trait;
use jsenv_graph::{Reference, ReferenceKind, Subtype, UrlInfo, UrlType};
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, ExportAllDeclaration, ExportNamedDeclaration, Expression,
    ImportDeclaration, ImportExpression, NewExpression, ObjectPropertyKind, Program, PropertyKey,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::SourceType;

use super::css::sourcemap_comment_reference;
use super::{is_ignored_specifier, reference_at, text_of};
use crate::diagnostics::ParseError;
use crate::plugins::{Plugin, PluginPhase, TransformContext, TransformOutput};
use crate::Result;

const NAME: &str = "jsenv:js-references";

/// A specifier literal found in JavaScript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsSpecifier {
    pub value: String,
    /// Byte range of the literal's text, quotes excluded.
    pub start: usize,
    pub end: usize,
    pub kind: ReferenceKind,
    pub expected_type: Option<UrlType>,
    pub subtype: Option<Subtype>,
}

/// oxc source type for a JS node.
pub(crate) fn source_type_for(url_type: UrlType) -> SourceType {
    match url_type {
        UrlType::JsClassic => SourceType::mjs().with_module(false),
        _ => SourceType::mjs(),
    }
}

/// Parse `source`, turning the first syntax error into a [`ParseError`].
pub(crate) fn parse_program<'a>(
    allocator: &'a Allocator,
    url: &str,
    source: &'a str,
    url_type: UrlType,
) -> std::result::Result<Program<'a>, ParseError> {
    let ret = Parser::new(allocator, source, source_type_for(url_type)).parse();
    if let Some(error) = ret.errors.first() {
        let offset = error
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| label.offset())
            .unwrap_or(0);
        return Err(ParseError::new(url, source, offset, error.message.to_string()));
    }
    Ok(ret.program)
}

/// Parse `source` and collect its specifiers. A syntax error is returned as
/// a [`ParseError`] located in `source`.
pub fn scan_js(
    url: &str,
    source: &str,
    url_type: UrlType,
) -> std::result::Result<Vec<JsSpecifier>, ParseError> {
    let allocator = Allocator::default();
    let program = parse_program(&allocator, url, source, url_type)?;

    let mut collector = SpecifierCollector::default();
    collector.visit_program(&program);
    let mut specifiers = collector.specifiers;
    // A `new URL()` nested in `new Worker()` is recorded once, as the worker.
    let mut seen = std::collections::HashSet::new();
    specifiers.retain(|specifier| seen.insert((specifier.start, specifier.end)));
    specifiers.sort_by_key(|specifier| specifier.start);
    Ok(specifiers)
}

#[derive(Debug, Default)]
struct SpecifierCollector {
    specifiers: Vec<JsSpecifier>,
}

impl SpecifierCollector {
    fn push(
        &mut self,
        literal: Option<(String, u32, u32)>,
        kind: ReferenceKind,
        expected_type: Option<UrlType>,
        subtype: Option<Subtype>,
    ) {
        if let Some((value, start, end)) = literal {
            self.specifiers.push(JsSpecifier {
                value,
                start: start as usize,
                end: end as usize,
                kind,
                expected_type,
                subtype,
            });
        }
    }

    /// Specifier of a worker-like first argument: a string, or
    /// `new URL(string, import.meta.url)`.
    fn worker_specifier(argument: Option<&Argument<'_>>) -> Option<(String, u32, u32)> {
        let expression = argument?.as_expression()?;
        if let Some(literal) = string_value(expression) {
            return Some(literal);
        }
        match expression {
            Expression::NewExpression(new_url) => url_constructor_specifier(new_url),
            _ => None,
        }
    }
}

/// Text and inner span of a string literal or an expression-less template.
fn string_value(expression: &Expression<'_>) -> Option<(String, u32, u32)> {
    match expression {
        Expression::StringLiteral(literal) => Some((
            literal.value.to_string(),
            literal.span.start + 1,
            literal.span.end - 1,
        )),
        Expression::TemplateLiteral(template) if template.expressions.is_empty() => {
            let quasi = template.quasis.first()?;
            Some((
                quasi.value.raw.to_string(),
                quasi.span.start,
                quasi.span.end,
            ))
        }
        _ => None,
    }
}

fn is_import_meta_url(expression: &Expression<'_>) -> bool {
    match expression {
        Expression::StaticMemberExpression(member) => {
            member.property.name == "url"
                && matches!(
                    &member.object,
                    Expression::MetaProperty(meta)
                        if meta.meta.name == "import" && meta.property.name == "meta"
                )
        }
        _ => false,
    }
}

/// `new URL("x", import.meta.url)`.
fn url_constructor_specifier(new: &NewExpression<'_>) -> Option<(String, u32, u32)> {
    let Expression::Identifier(callee) = &new.callee else {
        return None;
    };
    if callee.name != "URL" || new.arguments.len() < 2 {
        return None;
    }
    let base = new.arguments[1].as_expression()?;
    if !is_import_meta_url(base) {
        return None;
    }
    string_value(new.arguments[0].as_expression()?)
}

/// `{ type: "module" }` among the options of a worker or registration.
fn has_module_type(options: Option<&Argument<'_>>) -> bool {
    let Some(Expression::ObjectExpression(object)) = options.and_then(|o| o.as_expression())
    else {
        return false;
    };
    object.properties.iter().any(|property| match property {
        ObjectPropertyKind::ObjectProperty(property) => {
            let is_type_key = match &property.key {
                PropertyKey::StaticIdentifier(key) => key.name == "type",
                PropertyKey::StringLiteral(key) => key.value == "type",
                _ => false,
            };
            is_type_key
                && matches!(&property.value, Expression::StringLiteral(value) if value.value == "module")
        }
        _ => false,
    })
}

/// `navigator.serviceWorker.register` (optionally behind `window.`).
fn is_service_worker_register(callee: &Expression<'_>) -> bool {
    let Expression::StaticMemberExpression(register) = callee else {
        return false;
    };
    if register.property.name != "register" {
        return false;
    }
    match &register.object {
        Expression::StaticMemberExpression(service_worker) => {
            service_worker.property.name == "serviceWorker"
        }
        _ => false,
    }
}

impl<'a> Visit<'a> for SpecifierCollector {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        let source = &it.source;
        self.push(
            Some((source.value.to_string(), source.span.start + 1, source.span.end - 1)),
            ReferenceKind::JsImport,
            Some(UrlType::JsModule),
            Some(Subtype::ImportStatic),
        );
        walk::walk_import_declaration(self, it);
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &it.source {
            self.push(
                Some((source.value.to_string(), source.span.start + 1, source.span.end - 1)),
                ReferenceKind::JsImport,
                Some(UrlType::JsModule),
                Some(Subtype::ImportStatic),
            );
        }
        walk::walk_export_named_declaration(self, it);
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        let source = &it.source;
        self.push(
            Some((source.value.to_string(), source.span.start + 1, source.span.end - 1)),
            ReferenceKind::JsImport,
            Some(UrlType::JsModule),
            Some(Subtype::ImportStatic),
        );
        walk::walk_export_all_declaration(self, it);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        self.push(
            string_value(&it.source),
            ReferenceKind::JsDynamicImport,
            Some(UrlType::JsModule),
            Some(Subtype::ImportDynamic),
        );
        walk::walk_import_expression(self, it);
    }

    fn visit_new_expression(&mut self, it: &NewExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee {
            match callee.name.as_str() {
                "Worker" | "SharedWorker" => {
                    let subtype = if callee.name == "Worker" {
                        Subtype::Worker
                    } else {
                        Subtype::SharedWorker
                    };
                    let expected = if has_module_type(it.arguments.get(1)) {
                        UrlType::JsModule
                    } else {
                        UrlType::JsClassic
                    };
                    self.push(
                        Self::worker_specifier(it.arguments.first()),
                        ReferenceKind::JsWorker,
                        Some(expected),
                        Some(subtype),
                    );
                }
                "URL" => {
                    self.push(url_constructor_specifier(it), ReferenceKind::JsUrl, None, None);
                }
                _ => {}
            }
        }
        walk::walk_new_expression(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if is_service_worker_register(&it.callee) {
            let expected = if has_module_type(it.arguments.get(1)) {
                UrlType::JsModule
            } else {
                UrlType::JsClassic
            };
            self.push(
                Self::worker_specifier(it.arguments.first()),
                ReferenceKind::JsServiceWorker,
                Some(expected),
                Some(Subtype::ServiceWorker),
            );
        } else if matches!(&it.callee, Expression::Identifier(callee) if callee.name == "importScripts")
        {
            for argument in &it.arguments {
                let literal = argument.as_expression().and_then(string_value);
                self.push(
                    literal,
                    ReferenceKind::JsImportScripts,
                    Some(UrlType::JsClassic),
                    None,
                );
            }
        }
        walk::walk_call_expression(self, it);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsReferencesPlugin;

impl JsReferencesPlugin {
    pub fn references(info: &UrlInfo, source: &str) -> Result<Vec<Reference>> {
        let specifiers = scan_js(&info.url, source, info.url_type)
            .map_err(|error| error.remap(info.sourcemap.as_ref()))?;
        let mut references: Vec<Reference> = specifiers
            .into_iter()
            .filter(|specifier| !is_ignored_specifier(&specifier.value))
            .map(|specifier| {
                let mut reference = reference_at(
                    info,
                    source,
                    &specifier.value,
                    specifier.start,
                    specifier.end,
                    specifier.kind,
                );
                reference.expected_type = specifier.expected_type;
                reference.expected_subtype = specifier.subtype;
                reference
            })
            .collect();
        if let Some(reference) = sourcemap_comment_reference(info, source) {
            references.push(reference);
        }
        Ok(references)
    }
}

#[async_trait]
impl Plugin for JsReferencesPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::References
    }

    fn transform_types(&self) -> &[UrlType] {
        &[UrlType::JsModule, UrlType::JsClassic]
    }

    async fn transform_url_content(
        &self,
        info: &UrlInfo,
        ctx: &mut TransformContext,
    ) -> Result<Option<TransformOutput>> {
        let source = text_of(info, NAME)?;
        for reference in Self::references(info, source)? {
            ctx.inject_reference(reference);
        }
        Ok(None)
    }
}
