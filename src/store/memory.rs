use super::{select_active, RuleStore};
use crate::error::LookupError;
use crate::records::Module;
use crate::scoring::ScoringRule;

/// Rule store holding a fixed set of rules, typically loaded from config.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleStore {
    rules: Vec<ScoringRule>,
}

impl InMemoryRuleStore {
    pub fn new(rules: Vec<ScoringRule>) -> Self {
        Self { rules }
    }

    /// All rules, active or not
    pub fn rules(&self) -> &[ScoringRule] {
        &self.rules
    }
}

impl RuleStore for InMemoryRuleStore {
    fn active_rules(&self, module: Module) -> Result<Vec<ScoringRule>, LookupError> {
        Ok(select_active(&self.rules, module))
    }
}
