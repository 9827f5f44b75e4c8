use tracing::debug;

use super::config::{Criterion, OperationType};
use crate::error::{LookupError, ScoreError};
use crate::records::Scorable;
use crate::store::RuleStore;

/// Decides whether a record satisfies a criterion.
///
/// Must be deterministic for a given (criterion, record) pair at a point in time.
pub trait CriterionEvaluator<R: ?Sized> {
    fn evaluate(&self, criterion: &Criterion, record: &R) -> Result<bool, LookupError>;
}

impl<R, F> CriterionEvaluator<R> for F
where
    R: ?Sized,
    F: Fn(&Criterion, &R) -> Result<bool, LookupError>,
{
    fn evaluate(&self, criterion: &Criterion, record: &R) -> Result<bool, LookupError> {
        self(criterion, record)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CriterionContribution {
    pub rule: String,
    pub order: u32,
    pub operation: OperationType,
    pub points: f64,
    pub matched: bool,
    pub signed_points: f64, // 0 when not matched
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub score: f64,
    pub rules_evaluated: usize,
    pub breakdown: Vec<CriterionContribution>,
}

impl ScoreResult {
    pub fn matched(&self) -> impl Iterator<Item = &CriterionContribution> {
        self.breakdown.iter().filter(|c| c.matched)
    }
}

/// Sums signed criterion points over the active rules of a record's module.
#[derive(Debug, Clone)]
pub struct ScoreCalculator<S, E> {
    store: S,
    evaluator: E,
}

impl<S: RuleStore, E> ScoreCalculator<S, E> {
    pub fn new(store: S, evaluator: E) -> Self {
        Self { store, evaluator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Total score for `record`. 0 when no active rule exists for its module.
    pub fn compute_score<R>(&self, record: &R) -> Result<f64, ScoreError>
    where
        R: Scorable + ?Sized,
        E: CriterionEvaluator<R>,
    {
        self.explain(record).map(|result| result.score)
    }

    /// Score plus a per-criterion breakdown in evaluation order.
    pub fn explain<R>(&self, record: &R) -> Result<ScoreResult, ScoreError>
    where
        R: Scorable + ?Sized,
        E: CriterionEvaluator<R>,
    {
        let module = record.module();
        let lookup_failure = |source: LookupError| ScoreError::LookupFailure { module, source };

        let rules = self.store.active_rules(module).map_err(lookup_failure)?;
        debug!(module = %module, rules = rules.len(), "fetched active rules");

        let mut score = 0.0;
        let mut rules_evaluated = 0;
        let mut breakdown = Vec::new();

        for rule in &rules {
            // only active rules of this module contribute, whatever the store returns
            if !rule.active || rule.module != module {
                continue;
            }
            rules_evaluated += 1;

            let mut criteria = self.store.criteria(rule).map_err(lookup_failure)?;
            criteria.sort_by_key(|c| c.order);
            if let Some(pair) = criteria.windows(2).find(|pair| pair[0].order == pair[1].order) {
                return Err(ScoreError::MalformedCriterion {
                    rule: rule.name.clone(),
                    order: pair[1].order,
                    reason: "duplicate order".to_string(),
                });
            }

            for criterion in &criteria {
                let malformed = |reason: String| ScoreError::MalformedCriterion {
                    rule: rule.name.clone(),
                    order: criterion.order,
                    reason,
                };
                let (operation, points) = criterion.resolve().map_err(malformed)?;

                let matched = self
                    .evaluator
                    .evaluate(criterion, record)
                    .map_err(lookup_failure)?;
                let signed_points = if matched { operation.apply(points) } else { 0.0 };
                score += signed_points;
                if !score.is_finite() {
                    return Err(malformed(format!("running total overflowed to {}", score)));
                }

                debug!(
                    rule = %rule.name,
                    order = criterion.order,
                    matched,
                    signed_points,
                    "criterion evaluated"
                );

                breakdown.push(CriterionContribution {
                    rule: rule.name.clone(),
                    order: criterion.order,
                    operation,
                    points,
                    matched,
                    signed_points,
                });
            }
        }

        Ok(ScoreResult {
            score,
            rules_evaluated,
            breakdown,
        })
    }

    /// Score a batch, highest first. Ties keep input order. Stops at the first error.
    pub fn score_all<'a, R>(
        &self,
        records: &'a [R],
    ) -> Result<Vec<(&'a R, ScoreResult)>, ScoreError>
    where
        R: Scorable,
        E: CriterionEvaluator<R>,
    {
        let mut scored = records
            .iter()
            .map(|record| self.explain(record).map(|result| (record, result)))
            .collect::<Result<Vec<_>, _>>()?;

        scored.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Module, Record};
    use crate::scoring::conditions::{ConditionEvaluator, LogicalOperator, Operator};
    use crate::scoring::{Condition, ScoringRule};
    use crate::store::InMemoryRuleStore;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn criterion(order: u32, points: f64, operation: OperationType) -> Criterion {
        Criterion {
            order,
            points: Some(points),
            operation_type: Some(operation),
            conditions: vec![],
        }
    }

    fn rule(name: &str, active: bool, criteria: Vec<Criterion>) -> ScoringRule {
        ScoringRule {
            name: name.to_string(),
            module: Module::Lead,
            active,
            description: None,
            criteria,
        }
    }

    /// Rule A: +10 then -3, both always matching
    fn rule_a(active: bool) -> ScoringRule {
        rule(
            "Rule A",
            active,
            vec![
                criterion(1, 10.0, OperationType::Add),
                criterion(2, 3.0, OperationType::Sub),
            ],
        )
    }

    fn lead() -> Record {
        Record::new("L-1", Module::Lead).with_field("source", "website")
    }

    fn always(_: &Criterion, _: &Record) -> Result<bool, LookupError> {
        Ok(true)
    }

    fn never(_: &Criterion, _: &Record) -> Result<bool, LookupError> {
        Ok(false)
    }

    type Predicate = fn(&Criterion, &Record) -> Result<bool, LookupError>;

    fn calculator(rules: Vec<ScoringRule>) -> ScoreCalculator<InMemoryRuleStore, Predicate> {
        ScoreCalculator::new(InMemoryRuleStore::new(rules), always as Predicate)
    }

    /// Store that ignores the active flag and the module, returning rules as given
    struct UnfilteredStore(Vec<ScoringRule>);

    impl RuleStore for UnfilteredStore {
        fn active_rules(&self, _module: Module) -> Result<Vec<ScoringRule>, LookupError> {
            Ok(self.0.clone())
        }
    }

    struct FailingStore;

    impl RuleStore for FailingStore {
        fn active_rules(&self, _module: Module) -> Result<Vec<ScoringRule>, LookupError> {
            Err(LookupError::StoreUnavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_rule_a_scores_seven() {
        let calc = calculator(vec![rule_a(true)]);
        assert_eq!(calc.compute_score(&lead()).unwrap(), 7.0);
    }

    #[test]
    fn test_inactive_rule_scores_zero() {
        let calc = calculator(vec![rule_a(false)]);
        assert_eq!(calc.compute_score(&lead()).unwrap(), 0.0);
    }

    #[test]
    fn test_inactive_rule_ignored_even_if_store_returns_it() {
        let calc = ScoreCalculator::new(
            UnfilteredStore(vec![rule_a(false), rule_a(true)]),
            always as Predicate,
        );
        let result = calc.explain(&lead()).unwrap();
        assert_eq!(result.score, 7.0);
        assert_eq!(result.rules_evaluated, 1);
    }

    #[test]
    fn test_other_module_rules_ignored_even_if_store_returns_them() {
        let mut contact_rule = rule_a(true);
        contact_rule.module = Module::Contact;
        let calc = ScoreCalculator::new(UnfilteredStore(vec![contact_rule]), always as Predicate);
        assert_eq!(calc.compute_score(&lead()).unwrap(), 0.0);
    }

    #[test]
    fn test_toggling_inactive_removes_exact_contribution() {
        let rule_b = rule("Rule B", true, vec![criterion(1, 4.0, OperationType::Add)]);
        let both = calculator(vec![rule_a(true), rule_b.clone()]);
        let without_a = calculator(vec![rule_a(false), rule_b]);

        let full = both.compute_score(&lead()).unwrap();
        let reduced = without_a.compute_score(&lead()).unwrap();
        assert_eq!(full - reduced, 7.0);
    }

    #[test]
    fn test_two_rules_sum() {
        let rule_b = rule(
            "Rule B",
            true,
            vec![
                criterion(1, 5.0, OperationType::Add),
                criterion(2, 1.0, OperationType::Sub),
            ],
        );
        let calc = calculator(vec![rule_a(true), rule_b]);
        assert_eq!(calc.compute_score(&lead()).unwrap(), 11.0);
    }

    #[test]
    fn test_rule_order_does_not_change_total() {
        let rule_b = rule("Rule B", true, vec![criterion(1, 4.0, OperationType::Add)]);
        let rule_c = rule("Rule C", true, vec![criterion(1, 2.5, OperationType::Sub)]);

        let forward = calculator(vec![rule_a(true), rule_b.clone(), rule_c.clone()]);
        let reversed = calculator(vec![rule_c, rule_b, rule_a(true)]);
        assert_eq!(
            forward.compute_score(&lead()).unwrap(),
            reversed.compute_score(&lead()).unwrap()
        );
    }

    #[test]
    fn test_no_rules_scores_zero() {
        let calc = calculator(vec![]);
        let result = calc.explain(&lead()).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.rules_evaluated, 0);
        assert!(result.breakdown.is_empty());
    }

    #[test]
    fn test_module_without_rules_scores_zero() {
        let calc = calculator(vec![rule_a(true)]);
        let account = Record::new("A-1", Module::Account);
        assert_eq!(calc.compute_score(&account).unwrap(), 0.0);
    }

    #[test]
    fn test_unmatched_criterion_contributes_nothing() {
        let calc = ScoreCalculator::new(
            InMemoryRuleStore::new(vec![rule_a(true)]),
            never as Predicate,
        );
        let result = calc.explain(&lead()).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.rules_evaluated, 1);
        assert_eq!(result.breakdown.len(), 2);
        assert!(result.breakdown.iter().all(|c| !c.matched && c.signed_points == 0.0));
    }

    #[test]
    fn test_sign_correctness() {
        let plus = vec![criterion(1, 5.0, OperationType::Add)];
        let minus = vec![criterion(1, 5.0, OperationType::Sub)];
        let add = calculator(vec![rule("Add", true, plus)]);
        let sub = calculator(vec![rule("Sub", true, minus)]);
        assert_eq!(add.compute_score(&lead()).unwrap(), 5.0);
        assert_eq!(sub.compute_score(&lead()).unwrap(), -5.0);
    }

    #[test]
    fn test_total_can_go_negative() {
        let calc = calculator(vec![rule(
            "Penalties",
            true,
            vec![
                criterion(1, 2.0, OperationType::Add),
                criterion(2, 7.5, OperationType::Sub),
            ],
        )]);
        assert_eq!(calc.compute_score(&lead()).unwrap(), -5.5);
    }

    #[test]
    fn test_criteria_visited_in_ascending_order() {
        let store = InMemoryRuleStore::new(vec![rule(
            "Shuffled",
            true,
            vec![
                criterion(30, 1.0, OperationType::Add),
                criterion(10, 1.0, OperationType::Add),
                criterion(20, 1.0, OperationType::Sub),
            ],
        )]);

        let visited = RefCell::new(Vec::new());
        let recording = |c: &Criterion, _: &Record| -> Result<bool, LookupError> {
            visited.borrow_mut().push(c.order);
            Ok(true)
        };
        let calc = ScoreCalculator::new(store, recording);

        let result = calc.explain(&lead()).unwrap();
        assert_eq!(*visited.borrow(), vec![10, 20, 30]);
        let orders: Vec<u32> = result.breakdown.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![10, 20, 30]);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_missing_points_is_malformed() {
        let mut broken = criterion(2, 0.0, OperationType::Add);
        broken.points = None;
        let criteria = vec![criterion(1, 1.0, OperationType::Add), broken];
        let calc = calculator(vec![rule("Broken", true, criteria)]);

        match calc.compute_score(&lead()).unwrap_err() {
            ScoreError::MalformedCriterion { rule, order, reason } => {
                assert_eq!(rule, "Broken");
                assert_eq!(order, 2);
                assert_eq!(reason, "missing points");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_operation_is_malformed_even_when_unmatched() {
        let mut broken = criterion(1, 3.0, OperationType::Add);
        broken.operation_type = None;
        let calc = ScoreCalculator::new(
            InMemoryRuleStore::new(vec![rule("Broken", true, vec![broken])]),
            never as Predicate,
        );
        assert!(matches!(
            calc.compute_score(&lead()),
            Err(ScoreError::MalformedCriterion { .. })
        ));
    }

    #[test]
    fn test_store_failure_propagates() {
        let calc = ScoreCalculator::new(FailingStore, always as Predicate);
        match calc.compute_score(&lead()).unwrap_err() {
            ScoreError::LookupFailure { module, source } => {
                assert_eq!(module, Module::Lead);
                assert!(matches!(source, LookupError::StoreUnavailable(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_evaluator_failure_aborts() {
        let failing = |c: &Criterion, _: &Record| -> Result<bool, LookupError> {
            if c.order == 2 {
                Err(LookupError::InvalidCondition {
                    field: "x".to_string(),
                    reason: "boom".to_string(),
                })
            } else {
                Ok(true)
            }
        };
        let calc = ScoreCalculator::new(InMemoryRuleStore::new(vec![rule_a(true)]), failing);
        assert!(matches!(
            calc.explain(&lead()),
            Err(ScoreError::LookupFailure { .. })
        ));
    }

    #[test]
    fn test_with_condition_evaluator() {
        let mut matching = criterion(1, 10.0, OperationType::Add);
        matching.conditions = vec![Condition {
            field: "source".to_string(),
            operator: Operator::Equals,
            value: Some(json!("Website")),
            logical_operator: LogicalOperator::And,
        }];
        let mut missing_email = criterion(2, 3.0, OperationType::Sub);
        missing_email.conditions = vec![Condition {
            field: "email".to_string(),
            operator: Operator::IsEmpty,
            value: None,
            logical_operator: LogicalOperator::And,
        }];
        let mut big_company = criterion(3, 20.0, OperationType::Add);
        big_company.conditions = vec![Condition {
            field: "employees".to_string(),
            operator: Operator::GreaterThan,
            value: Some(json!(500)),
            logical_operator: LogicalOperator::And,
        }];

        let criteria = vec![matching, missing_email, big_company];
        let calc = ScoreCalculator::new(
            InMemoryRuleStore::new(vec![rule("Inbound", true, criteria)]),
            ConditionEvaluator::new(),
        );

        let result = calc.explain(&lead()).unwrap();
        assert_eq!(result.score, 7.0);
        assert_eq!(result.matched().count(), 2);
    }

    #[test]
    fn test_score_all_sorted_descending() {
        let mut hot = criterion(1, 10.0, OperationType::Add);
        hot.conditions = vec![Condition {
            field: "source".to_string(),
            operator: Operator::Equals,
            value: Some(json!("referral")),
            logical_operator: LogicalOperator::And,
        }];
        let calc = ScoreCalculator::new(
            InMemoryRuleStore::new(vec![rule("Referral", true, vec![hot])]),
            ConditionEvaluator::new(),
        );

        let records = vec![
            Record::new("L-1", Module::Lead).with_field("source", "website"),
            Record::new("L-2", Module::Lead).with_field("source", "referral"),
            Record::new("C-1", Module::Contact),
        ];
        let scored = calc.score_all(&records).unwrap();
        let ids: Vec<&str> = scored.iter().map(|(r, _)| r.id.as_str()).collect();
        assert_eq!(ids, vec!["L-2", "L-1", "C-1"]);
        assert_eq!(scored[0].1.score, 10.0);
    }

    #[test]
    fn test_decimal_points() {
        let calc = calculator(vec![rule(
            "Fractional",
            true,
            vec![
                criterion(1, 0.25, OperationType::Add),
                criterion(2, 0.5, OperationType::Add),
            ],
        )]);
        assert_eq!(calc.compute_score(&lead()).unwrap(), 0.75);
    }

    #[test]
    fn test_duplicate_order_is_malformed() {
        let calc = ScoreCalculator::new(
            InMemoryRuleStore::new(vec![rule(
                "Twice",
                true,
                vec![
                    criterion(1, 10.0, OperationType::Add),
                    criterion(1, 5.0, OperationType::Add),
                ],
            )]),
            ConditionEvaluator::new(),
        );

        match calc.compute_score(&lead()).unwrap_err() {
            ScoreError::MalformedCriterion { rule, order, reason } => {
                assert_eq!(rule, "Twice");
                assert_eq!(order, 1);
                assert_eq!(reason, "duplicate order");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_overflowing_total_is_malformed() {
        let calc = calculator(vec![rule(
            "Huge",
            true,
            vec![
                criterion(1, f64::MAX, OperationType::Add),
                criterion(2, f64::MAX, OperationType::Add),
            ],
        )]);

        match calc.compute_score(&lead()).unwrap_err() {
            ScoreError::MalformedCriterion { order, reason, .. } => {
                assert_eq!(order, 2);
                assert!(reason.contains("overflowed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_score_all_orders_negative_scores() {
        let mut referral = criterion(1, 3.0, OperationType::Add);
        referral.conditions = vec![Condition {
            field: "source".to_string(),
            operator: Operator::Equals,
            value: Some(json!("referral")),
            logical_operator: LogicalOperator::And,
        }];
        let mut cold = criterion(2, 5.0, OperationType::Sub);
        cold.conditions = vec![Condition {
            field: "source".to_string(),
            operator: Operator::Equals,
            value: Some(json!("cold call")),
            logical_operator: LogicalOperator::And,
        }];
        let calc = ScoreCalculator::new(
            InMemoryRuleStore::new(vec![rule("Source", true, vec![referral, cold])]),
            ConditionEvaluator::new(),
        );

        let records = vec![
            Record::new("L-1", Module::Lead).with_field("source", "cold call"),
            Record::new("L-2", Module::Lead).with_field("source", "website"),
            Record::new("L-3", Module::Lead).with_field("source", "referral"),
        ];
        let scored = calc.score_all(&records).unwrap();
        let scores: Vec<f64> = scored.iter().map(|(_, result)| result.score).collect();
        assert_eq!(scores, vec![3.0, 0.0, -5.0]);
    }

    /// Keeps criteria apart from their rules, keyed by rule name
    struct SplitStore {
        rules: Vec<ScoringRule>,
        criteria: HashMap<String, Vec<Criterion>>,
    }

    impl RuleStore for SplitStore {
        fn active_rules(&self, _module: Module) -> Result<Vec<ScoringRule>, LookupError> {
            Ok(self.rules.clone())
        }

        fn criteria(&self, rule: &ScoringRule) -> Result<Vec<Criterion>, LookupError> {
            self.criteria.get(&rule.name).cloned().ok_or_else(|| {
                LookupError::StoreUnavailable(format!("no criteria stored for '{}'", rule.name))
            })
        }
    }

    #[test]
    fn test_criteria_come_from_store() {
        let mut criteria = HashMap::new();
        criteria.insert(
            "Stored".to_string(),
            vec![
                criterion(2, 1.0, OperationType::Sub),
                criterion(1, 6.0, OperationType::Add),
            ],
        );
        let store = SplitStore {
            rules: vec![rule("Stored", true, vec![])],
            criteria,
        };

        let calc = ScoreCalculator::new(store, always as Predicate);
        let result = calc.explain(&lead()).unwrap();
        assert_eq!(result.score, 5.0);
        assert_eq!(result.breakdown.len(), 2);
        assert_eq!(result.breakdown[0].order, 1);
    }

    #[test]
    fn test_criteria_fetch_failure_propagates() {
        let store = SplitStore {
            rules: vec![rule_a(true)],
            criteria: HashMap::new(),
        };

        let calc = ScoreCalculator::new(store, always as Predicate);
        match calc.compute_score(&lead()).unwrap_err() {
            ScoreError::LookupFailure { module, source } => {
                assert_eq!(module, Module::Lead);
                assert!(matches!(source, LookupError::StoreUnavailable(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_boxed_and_borrowed_stores() {
        let boxed: Box<dyn RuleStore> = Box::new(InMemoryRuleStore::new(vec![rule_a(true)]));
        let calc = ScoreCalculator::new(boxed, always as Predicate);
        assert_eq!(calc.compute_score(&lead()).unwrap(), 7.0);

        let boxed_failing: Box<dyn RuleStore> = Box::new(FailingStore);
        let calc = ScoreCalculator::new(boxed_failing, always as Predicate);
        assert!(calc.compute_score(&lead()).is_err());

        let owned = InMemoryRuleStore::new(vec![rule_a(true)]);
        let calc = ScoreCalculator::new(&owned, always as Predicate);
        assert_eq!(calc.compute_score(&lead()).unwrap(), 7.0);
    }
}
