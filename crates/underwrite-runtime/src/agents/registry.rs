//! Kind-to-agent dispatch table.

use std::collections::BTreeMap;

use underwrite_core::{Check, CheckKind};

use super::{
    AgentDeps, CheckAgent, CriteriaAgent, GenericAgent, QualitativeAgent, ScoreAgent,
    ThresholdAgent,
};

pub type AgentBuilder = fn(&AgentDeps) -> Box<dyn CheckAgent>;

/// Builds a fresh agent per check, chosen only by `check.kind`.
///
/// Kinds without a registered builder get the generic agent.
#[derive(Clone)]
pub struct AgentRegistry {
    builders: BTreeMap<CheckKind, AgentBuilder>,
    deps: AgentDeps,
}

impl AgentRegistry {
    /// Registry with the built-in agent for every kind.
    pub fn builtins(deps: AgentDeps) -> Self {
        let mut registry = Self {
            builders: BTreeMap::new(),
            deps,
        };
        registry.register(CheckKind::Threshold, |d| Box::new(ThresholdAgent::new(d.clone())));
        registry.register(CheckKind::Criteria, |d| Box::new(CriteriaAgent::new(d.clone())));
        registry.register(CheckKind::Score, |d| Box::new(ScoreAgent::new(d.clone())));
        registry.register(CheckKind::Qualitative, |d| Box::new(QualitativeAgent::new(d.clone())));
        registry.register(CheckKind::Generic, |d| Box::new(GenericAgent::new(d.clone())));
        registry
    }

    /// Replace the builder for `kind`.
    pub fn register(&mut self, kind: CheckKind, builder: AgentBuilder) {
        self.builders.insert(kind, builder);
    }

    pub fn create(&self, check: &Check) -> Box<dyn CheckAgent> {
        match self.builders.get(&check.kind) {
            Some(build) => build(&self.deps),
            None => {
                tracing::debug!(check_id = %check.id, kind = %check.kind, "No agent registered, using generic");
                Box::new(GenericAgent::new(self.deps.clone()))
            }
        }
    }

    pub fn kinds(&self) -> Vec<CheckKind> {
        self.builders.keys().copied().collect()
    }

    pub fn deps(&self) -> &AgentDeps {
        &self.deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::deps;
    use crate::testing::ScriptedProvider;

    #[test]
    fn test_dispatch_by_kind() {
        let (deps, _) = deps(ScriptedProvider::new());
        let registry = AgentRegistry::builtins(deps);

        for kind in [
            CheckKind::Threshold,
            CheckKind::Criteria,
            CheckKind::Score,
            CheckKind::Qualitative,
            CheckKind::Generic,
        ] {
            let check = Check::new("X01", kind, "requirement");
            assert_eq!(registry.create(&check).kind(), kind);
        }
    }

    #[test]
    fn test_unregistered_kind_falls_back_to_generic() {
        let (deps, _) = deps(ScriptedProvider::new());
        let mut registry = AgentRegistry::builtins(deps);
        registry.builders.remove(&CheckKind::Score);

        let check = Check::new("SC01", CheckKind::Score, "Risk score at least 700");
        assert_eq!(registry.create(&check).kind(), CheckKind::Generic);
        assert_eq!(registry.kinds().len(), 4);
    }
}
