use std::collections::HashSet;

use glob::Pattern;

use super::conditions::Operator;
use super::config::ScoringRule;

/// Validate scoring rules at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_rules(rules: &[ScoringRule]) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();

    for (i, rule) in rules.iter().enumerate() {
        let path = format!("rules[{}]", i);

        if rule.name.trim().is_empty() {
            errors.push(format!("{}.name: must not be empty", path));
        } else if !names.insert((rule.module, rule.name.trim().to_lowercase())) {
            errors.push(format!(
                "{}.name: duplicate rule '{}' for module {}",
                path, rule.name, rule.module
            ));
        }

        let mut orders = HashSet::new();
        for (j, criterion) in rule.criteria.iter().enumerate() {
            let path = format!("{}.criteria[{}]", path, j);

            if !orders.insert(criterion.order) {
                errors.push(format!(
                    "{}.order: duplicate order {} within rule '{}'",
                    path, criterion.order, rule.name
                ));
            }

            match criterion.points {
                None => errors.push(format!("{}.points: missing", path)),
                Some(p) if !p.is_finite() || p < 0.0 => {
                    errors.push(format!("{}.points: must be non-negative, got {}", path, p))
                }
                Some(_) => {}
            }

            if criterion.operation_type.is_none() {
                errors.push(format!(
                    "{}.operation_type: missing (expected 'add' or 'sub')",
                    path
                ));
            }

            for (k, condition) in criterion.conditions.iter().enumerate() {
                let path = format!("{}.conditions[{}]", path, k);

                if condition.field.trim().is_empty() {
                    errors.push(format!("{}.field: must not be empty", path));
                }

                let Some(value) = condition.value.as_ref() else {
                    if condition.operator.requires_value() {
                        errors.push(format!("{}.value: required for this operator", path));
                    }
                    continue;
                };

                match condition.operator {
                    Operator::In if !value.is_array() => {
                        errors.push(format!("{}.value: 'in' expects a list", path));
                    }
                    Operator::Matches => {
                        let pattern = value.as_str().unwrap_or_default();
                        if let Err(e) = Pattern::new(pattern) {
                            errors.push(format!(
                                "{}.value: invalid glob '{}' - {}",
                                path, pattern, e
                            ));
                        }
                    }
                    Operator::Within | Operator::OlderThan => {
                        let raw = value.as_str().unwrap_or_default();
                        if let Err(e) = humantime::parse_duration(raw.trim()) {
                            errors.push(format!(
                                "{}.value: invalid duration '{}' - {}",
                                path, raw, e
                            ));
                        }
                    }
                    Operator::GreaterThan
                    | Operator::GreaterThanEqual
                    | Operator::LessThan
                    | Operator::LessThanEqual => {
                        let numeric = value.is_number()
                            || value.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok());
                        if !numeric {
                            errors.push(format!(
                                "{}.value: expected a number, got {}",
                                path, value
                            ));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
