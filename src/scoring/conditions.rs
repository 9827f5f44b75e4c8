use chrono::{DateTime, NaiveDate, Utc};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::{Condition, Criterion};
use super::engine::CriterionEvaluator;
use crate::error::LookupError;
use crate::records::Scorable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    IsEmpty,
    IsNotEmpty,
    In,
    Matches,
    Within,
    OlderThan,
}

impl Operator {
    /// Unary operators inspect only the field and take no `value`
    pub fn requires_value(&self) -> bool {
        !matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }

    /// Result when the record does not have the field at all
    fn on_missing_field(&self) -> bool {
        matches!(self, Operator::NotEquals | Operator::NotContains)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl Condition {
    /// Test this condition against `record`, using `now` for time-relative operators.
    pub fn evaluate<R: Scorable + ?Sized>(
        &self,
        record: &R,
        now: DateTime<Utc>,
    ) -> Result<bool, LookupError> {
        let actual = record.field(&self.field).filter(|v| !v.is_null());

        let expected = match self.operator {
            Operator::IsEmpty => return Ok(is_empty(actual)),
            Operator::IsNotEmpty => return Ok(!is_empty(actual)),
            _ => self
                .value
                .as_ref()
                .ok_or_else(|| self.invalid("operator requires a value"))?,
        };

        // a bad comparison value fails whether or not the record has the field
        self.check_expected(expected)?;

        match actual {
            Some(actual) => self.compare(actual, expected, now),
            None => Ok(self.operator.on_missing_field()),
        }
    }

    fn check_expected(&self, expected: &Value) -> Result<(), LookupError> {
        match self.operator {
            Operator::GreaterThan
            | Operator::GreaterThanEqual
            | Operator::LessThan
            | Operator::LessThanEqual => self.number(expected).map(drop),
            Operator::In => self.list(expected).map(drop),
            Operator::Matches => self.pattern(expected).map(drop),
            Operator::Within | Operator::OlderThan => self.duration(expected).map(drop),
            _ => Ok(()),
        }
    }

    fn compare(
        &self,
        actual: &Value,
        expected: &Value,
        now: DateTime<Utc>,
    ) -> Result<bool, LookupError> {
        match self.operator {
            Operator::Equals => Ok(values_equal(actual, expected)),
            Operator::NotEquals => Ok(!values_equal(actual, expected)),
            Operator::Contains => Ok(contains(actual, expected)),
            Operator::NotContains => Ok(!contains(actual, expected)),
            Operator::StartsWith => Ok(lower_text(actual).starts_with(&lower_text(expected))),
            Operator::EndsWith => Ok(lower_text(actual).ends_with(&lower_text(expected))),
            Operator::GreaterThan => Ok(self.number(actual)? > self.number(expected)?),
            Operator::GreaterThanEqual => Ok(self.number(actual)? >= self.number(expected)?),
            Operator::LessThan => Ok(self.number(actual)? < self.number(expected)?),
            Operator::LessThanEqual => Ok(self.number(actual)? <= self.number(expected)?),
            Operator::IsEmpty => Ok(is_empty(Some(actual))),
            Operator::IsNotEmpty => Ok(!is_empty(Some(actual))),
            Operator::In => {
                let items = self.list(expected)?;
                Ok(items.iter().any(|item| values_equal(actual, item)))
            }
            Operator::Matches => {
                let pattern = self.pattern(expected)?;
                let options = MatchOptions {
                    case_sensitive: false,
                    ..MatchOptions::new()
                };
                Ok(pattern.matches_with(&text(actual), options))
            }
            Operator::Within => Ok(self.age(actual, now)? <= self.duration(expected)?),
            Operator::OlderThan => Ok(self.age(actual, now)? > self.duration(expected)?),
        }
    }

    fn list<'v>(&self, value: &'v Value) -> Result<&'v Vec<Value>, LookupError> {
        value
            .as_array()
            .ok_or_else(|| self.invalid("'in' expects a list value"))
    }

    fn pattern(&self, value: &Value) -> Result<Pattern, LookupError> {
        Pattern::new(&text(value))
            .map_err(|e| self.invalid(format!("invalid glob pattern: {}", e)))
    }

    fn number(&self, value: &Value) -> Result<f64, LookupError> {
        as_number(value).ok_or_else(|| self.invalid(format!("expected a number, got {}", value)))
    }

    fn age(&self, value: &Value, now: DateTime<Utc>) -> Result<chrono::Duration, LookupError> {
        let timestamp = value.as_str().and_then(parse_timestamp).ok_or_else(|| {
            self.invalid(format!("expected an RFC 3339 timestamp or date, got {}", value))
        })?;
        Ok(now - timestamp)
    }

    fn duration(&self, value: &Value) -> Result<chrono::Duration, LookupError> {
        let raw = value
            .as_str()
            .ok_or_else(|| self.invalid(format!("expected a duration like '7d', got {}", value)))?;
        let std_duration = humantime::parse_duration(raw.trim())
            .map_err(|e| self.invalid(format!("invalid duration '{}': {}", raw, e)))?;
        chrono::Duration::from_std(std_duration)
            .map_err(|_| self.invalid(format!("duration '{}' is out of range", raw)))
    }

    fn invalid(&self, reason: impl Into<String>) -> LookupError {
        LookupError::InvalidCondition {
            field: self.field.clone(),
            reason: reason.into(),
        }
    }
}

/// Fold a condition list left to right. Each condition after the first joins
/// the running result with its own logical operator. Empty lists match.
pub fn evaluate_conditions<R: Scorable + ?Sized>(
    conditions: &[Condition],
    record: &R,
    now: DateTime<Utc>,
) -> Result<bool, LookupError> {
    let mut iter = conditions.iter();
    let Some(first) = iter.next() else {
        return Ok(true);
    };

    let mut result = first.evaluate(record, now)?;
    for condition in iter {
        let current = condition.evaluate(record, now)?;
        result = match condition.logical_operator {
            LogicalOperator::And => result && current,
            LogicalOperator::Or => result || current,
        };
    }
    Ok(result)
}

/// Default evaluator: tests a criterion's condition list against record fields.
#[derive(Debug, Clone, Default)]
pub struct ConditionEvaluator {
    now: Option<DateTime<Utc>>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self { now: None }
    }

    /// Evaluator with a fixed clock for `within` / `older_than`
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Some(now) }
    }
}

impl<R: Scorable + ?Sized> CriterionEvaluator<R> for ConditionEvaluator {
    fn evaluate(&self, criterion: &Criterion, record: &R) -> Result<bool, LookupError> {
        let now = self.now.unwrap_or_else(Utc::now);
        evaluate_conditions(&criterion.conditions, record, now)
    }
}

/// Parse an RFC 3339 timestamp, or a bare `YYYY-MM-DD` date at midnight UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lower_text(value: &Value) -> String {
    text(value).to_lowercase()
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (as_number(actual), as_number(expected)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => lower_text(actual) == lower_text(expected),
    }
}

/// Substring test for text fields, membership test for list fields
fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => lower_text(actual).contains(&lower_text(expected)),
    }
}
