//! Scenarios: the context a node is cooked for.
//!
//! The same source is served by the dev server, run by the test runner,
//! previewed from a build, or emitted by a production build. Plugins declare
//! which scenarios they apply during, and `import.meta.<scenario>` flags are
//! replaced according to the active one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    #[default]
    Dev,
    Test,
    Preview,
    Prod,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Dev,
        Scenario::Test,
        Scenario::Preview,
        Scenario::Prod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Dev => "dev",
            Scenario::Test => "test",
            Scenario::Preview => "preview",
            Scenario::Prod => "prod",
        }
    }

    /// Scenarios that produce build output rather than serving source.
    pub fn is_build(&self) -> bool {
        matches!(self, Scenario::Preview | Scenario::Prod)
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Scenario::Dev),
            "test" => Ok(Scenario::Test),
            "preview" => Ok(Scenario::Preview),
            "prod" | "production" => Ok(Scenario::Prod),
            other => Err(format!("unknown scenario: {other}")),
        }
    }
}

/// Set of scenarios a plugin applies during.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScenarioSet(u8);

impl ScenarioSet {
    pub const fn all() -> Self {
        Self(0b1111)
    }

    pub const fn none() -> Self {
        Self(0)
    }

    pub fn only(scenarios: &[Scenario]) -> Self {
        scenarios
            .iter()
            .fold(Self::none(), |set, scenario| set.with(*scenario))
    }

    /// Dev and test: scenarios served from source.
    pub fn serving() -> Self {
        Self::only(&[Scenario::Dev, Scenario::Test])
    }

    /// Preview and prod.
    pub fn building() -> Self {
        Self::only(&[Scenario::Preview, Scenario::Prod])
    }

    pub const fn with(self, scenario: Scenario) -> Self {
        Self(self.0 | bit(scenario))
    }

    pub const fn contains(&self, scenario: Scenario) -> bool {
        self.0 & bit(scenario) != 0
    }
}

impl Default for ScenarioSet {
    fn default() -> Self {
        Self::all()
    }
}

const fn bit(scenario: Scenario) -> u8 {
    match scenario {
        Scenario::Dev => 1,
        Scenario::Test => 1 << 1,
        Scenario::Preview => 1 << 2,
        Scenario::Prod => 1 << 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_set_membership() {
        let serving = ScenarioSet::serving();
        assert!(serving.contains(Scenario::Dev));
        assert!(serving.contains(Scenario::Test));
        assert!(!serving.contains(Scenario::Prod));

        let all = ScenarioSet::default();
        assert!(Scenario::ALL.iter().all(|s| all.contains(*s)));
        assert!(!ScenarioSet::none().contains(Scenario::Dev));
    }

    #[test]
    fn test_scenario_from_str() {
        assert_eq!("production".parse::<Scenario>().unwrap(), Scenario::Prod);
        assert_eq!("DEV".parse::<Scenario>().unwrap(), Scenario::Dev);
        assert!("staging".parse::<Scenario>().is_err());
        assert!(Scenario::Prod.is_build());
        assert!(!Scenario::Test.is_build());
    }
}
