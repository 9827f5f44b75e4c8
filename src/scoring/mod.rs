pub mod conditions;
pub mod config;
pub mod engine;
pub mod validation;

pub use conditions::{ConditionEvaluator, LogicalOperator, Operator};
pub use config::*;
pub use engine::{CriterionContribution, CriterionEvaluator, ScoreCalculator, ScoreResult};
pub use validation::validate_rules;
