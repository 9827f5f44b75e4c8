use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::conditions::{LogicalOperator, Operator};
use crate::records::Module;

/// A named, activatable collection of ordered criteria for one module.
///
/// Example YAML:
/// ```yaml
/// name: Inbound interest
/// module: lead
/// active: true
/// criteria:
///   - order: 1
///     points: 10
///     operation_type: add
///     conditions:
///       - { field: source, operator: equals, value: website }
///   - order: 2
///     points: 3
///     operation_type: sub
///     conditions:
///       - { field: email, operator: is_empty }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringRule {
    pub name: String,

    pub module: Module,

    /// Inactive rules never contribute (default: true)
    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub criteria: Vec<Criterion>,
}

fn default_active() -> bool {
    true
}

/// A single testable condition set with its point value and sign.
///
/// `points` and `operation_type` are optional on the wire so that a rule
/// missing either is reported as malformed rather than silently scored as 0.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Criterion {
    /// Evaluation position within the rule (ascending)
    pub order: u32,

    #[serde(default)]
    pub points: Option<f64>,

    #[serde(default)]
    pub operation_type: Option<OperationType>,

    /// Conditions joined left to right by their `logical_operator`.
    /// An empty list always matches.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Criterion {
    /// Resolve the operation and point value, or describe why they are unusable.
    pub fn resolve(&self) -> Result<(OperationType, f64), String> {
        let points = self
            .points
            .ok_or_else(|| "missing points".to_string())?;
        if !points.is_finite() || points < 0.0 {
            return Err(format!("points must be a non-negative number, got {}", points));
        }
        let operation = self
            .operation_type
            .ok_or_else(|| "missing operation_type (expected 'add' or 'sub')".to_string())?;
        Ok((operation, points))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OperationType {
    #[serde(rename = "add")]
    Add,
    #[serde(rename = "sub", alias = "subtract")]
    Sub,
}

impl OperationType {
    /// Signed contribution of `points` under this operation
    pub fn apply(&self, points: f64) -> f64 {
        match self {
            OperationType::Add => points,
            OperationType::Sub => -points,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            OperationType::Add => '+',
            OperationType::Sub => '-',
        }
    }
}

/// One field test inside a criterion.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    /// Record field name; dotted names reach into nested objects
    pub field: String,

    pub operator: Operator,

    /// Comparison value; omitted for `is_empty` / `is_not_empty`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// How this condition joins the result of the ones before it (default: and)
    #[serde(default)]
    pub logical_operator: LogicalOperator,
}
