use thiserror::Error;

use crate::records::Module;

/// Failure inside a collaborator: the rule store or the criterion evaluator.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("rule store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("condition on field '{field}' cannot be evaluated: {reason}")]
    InvalidCondition { field: String, reason: String },
}

/// Errors returned by score computation. Any error aborts the whole record.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("lookup failed while scoring {module} record")]
    LookupFailure {
        module: Module,
        #[source]
        source: LookupError,
    },

    #[error("malformed criterion (order {order}) in rule '{rule}': {reason}")]
    MalformedCriterion {
        rule: String,
        order: u32,
        reason: String,
    },
}
