//! Plugin registry with execution phases.
//!
//! Plugins are collected with their phase and sorted once, when the
//! registry is frozen into a [`PluginList`] for a scenario.

use jsenv_graph::UrlType;
use std::sync::Arc;

use super::Plugin;
use crate::scenario::Scenario;

/// Plugin execution phases
///
/// Plugins are executed in phase order (lower numbers first), then in
/// registration order within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginPhase {
    /// Virtual content providers (always first)
    Virtual = 0,

    /// Plugins that change how specifiers resolve or redirect
    Resolve = 10,

    /// Content transformation (user plugins, scenario flags)
    Transform = 20,

    /// Reference discovery on the transformed content
    References = 30,

    /// Output decoration (autoreload, banners)
    PostProcess = 100,
}

/// Plugin registry that maintains plugins in phase order
#[derive(Debug, Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<(PluginPhase, Arc<dyn Plugin>)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin using the phase it declares.
    pub fn add<P: Plugin + 'static>(&mut self, plugin: P) {
        self.add_shared(Arc::new(plugin));
    }

    pub fn add_shared(&mut self, plugin: Arc<dyn Plugin>) {
        let phase = plugin.phase();
        self.plugins.push((phase, plugin));
    }

    /// Add a plugin with an explicit phase, overriding the declared one.
    pub fn add_with_phase(&mut self, plugin: Arc<dyn Plugin>, phase: PluginPhase) {
        self.plugins.push((phase, plugin));
    }

    /// Append every plugin of `other`, keeping their phases.
    pub fn extend(&mut self, other: &PluginRegistry) {
        self.plugins.extend(other.plugins.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Freeze the registry for one scenario.
    ///
    /// Sorting happens here, once; the sort is stable so registration order
    /// is kept within a phase. Plugins that do not apply during `scenario`
    /// are dropped.
    pub fn for_scenario(&self, scenario: Scenario) -> PluginList {
        let mut plugins = self.plugins.clone();
        plugins.sort_by_key(|(phase, _)| *phase);
        PluginList {
            plugins: plugins
                .into_iter()
                .filter(|(_, plugin)| plugin.applies_during().contains(scenario))
                .map(|(_, plugin)| plugin)
                .collect(),
        }
    }
}

/// Sorted, scenario-filtered plugins.
#[derive(Debug, Default, Clone)]
pub struct PluginList {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginList {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter()
    }

    /// Plugins transforming `url_type`, in order.
    pub fn transformers(&self, url_type: UrlType) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .filter(move |plugin| plugin.transform_types().contains(&url_type))
    }

    /// Plugins bundling `url_type`, in order.
    pub fn bundlers(&self, url_type: UrlType) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .filter(move |plugin| plugin.bundle_types().contains(&url_type))
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioSet;

    #[derive(Debug)]
    struct Named {
        name: &'static str,
        phase: PluginPhase,
        scenarios: ScenarioSet,
        types: &'static [UrlType],
    }

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn phase(&self) -> PluginPhase {
            self.phase
        }

        fn applies_during(&self) -> ScenarioSet {
            self.scenarios
        }

        fn transform_types(&self) -> &[UrlType] {
            self.types
        }
    }

    fn named(name: &'static str, phase: PluginPhase) -> Named {
        Named {
            name,
            phase,
            scenarios: ScenarioSet::all(),
            types: &[UrlType::JsModule],
        }
    }

    #[test]
    fn test_sorted_by_phase_then_registration() {
        let mut registry = PluginRegistry::new();
        registry.add(named("refs", PluginPhase::References));
        registry.add(named("first", PluginPhase::Transform));
        registry.add(named("virtual", PluginPhase::Virtual));
        registry.add(named("second", PluginPhase::Transform));

        let list = registry.for_scenario(Scenario::Dev);
        assert_eq!(list.names(), vec!["virtual", "first", "second", "refs"]);
    }

    #[test]
    fn test_scenario_filter_and_type_dispatch() {
        let mut registry = PluginRegistry::new();
        registry.add(Named {
            scenarios: ScenarioSet::serving(),
            ..named("dev-only", PluginPhase::Transform)
        });
        registry.add(Named {
            types: &[UrlType::Css],
            ..named("css", PluginPhase::Transform)
        });

        let prod = registry.for_scenario(Scenario::Prod);
        assert_eq!(prod.names(), vec!["css"]);
        assert_eq!(prod.transformers(UrlType::JsModule).count(), 0);

        let dev = registry.for_scenario(Scenario::Dev);
        assert_eq!(dev.transformers(UrlType::JsModule).count(), 1);
        assert_eq!(dev.transformers(UrlType::Css).count(), 1);
    }

    #[test]
    fn test_explicit_phase_overrides_declared() {
        let mut registry = PluginRegistry::new();
        registry.add(named("a", PluginPhase::Transform));
        registry.add_with_phase(Arc::new(named("b", PluginPhase::PostProcess)), PluginPhase::Virtual);
        assert_eq!(registry.for_scenario(Scenario::Dev).names(), vec!["b", "a"]);
    }
}
