pub mod file;
pub mod memory;

pub use file::FileRuleStore;
pub use memory::InMemoryRuleStore;

use crate::error::LookupError;
use crate::records::Module;
use crate::scoring::{Criterion, ScoringRule};

/// Source of scoring rules.
///
/// Implementations may be backed by anything (memory, files, a database).
/// Rules come back in no particular order; callers must not rely on it.
pub trait RuleStore {
    /// Active rules whose module matches `module`
    fn active_rules(&self, module: Module) -> Result<Vec<ScoringRule>, LookupError>;

    /// Criteria belonging to `rule`, in any order
    fn criteria(&self, rule: &ScoringRule) -> Result<Vec<Criterion>, LookupError> {
        Ok(rule.criteria.clone())
    }
}

impl<T: RuleStore + ?Sized> RuleStore for &T {
    fn active_rules(&self, module: Module) -> Result<Vec<ScoringRule>, LookupError> {
        (**self).active_rules(module)
    }

    fn criteria(&self, rule: &ScoringRule) -> Result<Vec<Criterion>, LookupError> {
        (**self).criteria(rule)
    }
}

impl<T: RuleStore + ?Sized> RuleStore for Box<T> {
    fn active_rules(&self, module: Module) -> Result<Vec<ScoringRule>, LookupError> {
        (**self).active_rules(module)
    }

    fn criteria(&self, rule: &ScoringRule) -> Result<Vec<Criterion>, LookupError> {
        (**self).criteria(rule)
    }
}

/// Shared filter for the bundled stores
fn select_active<'a, I>(rules: I, module: Module) -> Vec<ScoringRule>
where
    I: IntoIterator<Item = &'a ScoringRule>,
{
    rules
        .into_iter()
        .filter(|rule| rule.active && rule.module == module)
        .cloned()
        .collect()
}
