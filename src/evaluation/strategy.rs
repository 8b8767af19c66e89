//! Evaluation strategies.
//!
//! An [`EvaluationStrategy`] evaluates function calls, value expressions and
//! whole tuple expressions. The optimizer folds constants through it, so
//! folded results always agree with what execution would compute.
//!
//! [`StrictEvaluationStrategy`] is a materializing reference evaluator: every
//! tuple expression returns the full list of its solutions. Each solution
//! carries the context bindings it was evaluated under.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::aggregate::evaluate_aggregate;
use super::error::{EvalError, EvalResult};
use super::eval::{compare_optional, evaluate, evaluate_condition};
use super::functions::FunctionRegistry;
use super::source::{EmptyTripleSource, TripleSource};
use crate::algebra::{BindingSet, GroupElem, OrderKey, TermPattern, TupleExpr, ValueExpr};
use crate::tuple::Value;

/// Evaluates algebra expressions.
pub trait EvaluationStrategy: Send + Sync {
    /// Call a function with already evaluated arguments.
    fn evaluate_function(&self, name: &str, args: &[Value]) -> EvalResult<Value>;

    /// Check if a function may be evaluated ahead of execution.
    fn is_deterministic(&self, name: &str) -> bool;

    /// Evaluate a value expression against a binding set.
    fn evaluate_value(&self, expr: &ValueExpr, bindings: &BindingSet) -> EvalResult<Value>;

    /// Evaluate a tuple expression under a context.
    fn evaluate(&self, expr: &TupleExpr, context: &BindingSet) -> EvalResult<Vec<BindingSet>>;
}

/// Reference evaluator that propagates every evaluation error.
pub struct StrictEvaluationStrategy {
    source: Arc<dyn TripleSource>,
    functions: FunctionRegistry,
}

impl StrictEvaluationStrategy {
    pub fn new(source: Arc<dyn TripleSource>) -> Self {
        Self {
            source,
            functions: FunctionRegistry::standard(),
        }
    }

    /// A strategy over an empty triple source.
    pub fn empty() -> Self {
        Self::new(Arc::new(EmptyTripleSource))
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn eval_pattern(
        &self,
        terms: [&TermPattern; 3],
        context: &BindingSet,
    ) -> EvalResult<Vec<BindingSet>> {
        let resolved: Vec<Option<Value>> = terms
            .iter()
            .map(|term| match term {
                TermPattern::Const(v) => Some(v.clone()),
                TermPattern::Var(name) => context.get(name).cloned(),
            })
            .collect();

        let statements = self.source.statements(
            resolved[0].as_ref(),
            resolved[1].as_ref(),
            resolved[2].as_ref(),
        )?;

        let mut results = Vec::with_capacity(statements.len());
        'statements: for statement in statements {
            let mut row = context.clone();
            for (term, value) in terms.iter().zip(statement) {
                if let TermPattern::Var(name) = term {
                    match row.get(name) {
                        // same variable twice in the pattern
                        Some(existing) if existing != &value => continue 'statements,
                        Some(_) => {}
                        None => row.insert(name.clone(), value),
                    }
                }
            }
            results.push(row);
        }
        Ok(results)
    }

    fn eval_group(
        &self,
        input: &TupleExpr,
        group_by: &[String],
        elements: &[GroupElem],
        context: &BindingSet,
    ) -> EvalResult<Vec<BindingSet>> {
        let rows = self.evaluate(input, context)?;

        // groups in first-seen order
        let mut keys: Vec<Vec<Option<Value>>> = Vec::new();
        let mut groups: HashMap<Vec<Option<Value>>, Vec<BindingSet>> = HashMap::new();
        if group_by.is_empty() {
            keys.push(Vec::new());
            groups.insert(Vec::new(), rows);
        } else {
            for row in rows {
                let key: Vec<Option<Value>> =
                    group_by.iter().map(|name| row.get(name).cloned()).collect();
                if !groups.contains_key(&key) {
                    keys.push(key.clone());
                }
                groups.entry(key).or_default().push(row);
            }
        }

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let members = groups.remove(&key).unwrap_or_default();
            let mut row = context.clone();
            for (name, value) in group_by.iter().zip(key) {
                if let Some(value) = value {
                    row.insert(name.clone(), value);
                }
            }
            for elem in elements {
                if row.contains(&elem.name) {
                    return Err(EvalError::AlreadyBound(elem.name.clone()));
                }
                let value = evaluate_aggregate(&elem.aggregate, &members, context, &self.functions)?;
                if let Some(value) = value {
                    row.insert(elem.name.clone(), value);
                }
            }
            results.push(row);
        }
        Ok(results)
    }

    fn eval_order(&self, mut rows: Vec<BindingSet>, keys: &[OrderKey]) -> Vec<BindingSet> {
        rows.sort_by(|a, b| {
            keys.iter()
                .map(|key| {
                    let ord = compare_optional(a.get(&key.name), b.get(&key.name));
                    if key.ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows
    }
}

impl EvaluationStrategy for StrictEvaluationStrategy {
    fn evaluate_function(&self, name: &str, args: &[Value]) -> EvalResult<Value> {
        self.functions.call(name, args)
    }

    fn is_deterministic(&self, name: &str) -> bool {
        self.functions.is_deterministic(name)
    }

    fn evaluate_value(&self, expr: &ValueExpr, bindings: &BindingSet) -> EvalResult<Value> {
        evaluate(expr, bindings, &self.functions)
    }

    fn evaluate(&self, expr: &TupleExpr, context: &BindingSet) -> EvalResult<Vec<BindingSet>> {
        match expr {
            TupleExpr::SingletonSet => Ok(vec![context.clone()]),

            TupleExpr::EmptySet => Ok(Vec::new()),

            TupleExpr::StatementPattern {
                subject,
                predicate,
                object,
            } => self.eval_pattern([subject, predicate, object], context),

            TupleExpr::Values { rows } => Ok(rows.iter().filter_map(|r| context.merge(r)).collect()),

            TupleExpr::Filter { input, condition } => {
                let mut results = Vec::new();
                for row in self.evaluate(input, context)? {
                    if evaluate_condition(condition, &row, &self.functions)? {
                        results.push(row);
                    }
                }
                Ok(results)
            }

            TupleExpr::Extension { input, elements } => {
                let mut rows = self.evaluate(input, context)?;
                for row in &mut rows {
                    for elem in elements {
                        if row.contains(&elem.name) {
                            return Err(EvalError::AlreadyBound(elem.name.clone()));
                        }
                        let value = evaluate(&elem.expr, row, &self.functions)?;
                        row.insert(elem.name.clone(), value);
                    }
                }
                Ok(rows)
            }

            TupleExpr::Projection { input, names } => Ok(self
                .evaluate(input, context)?
                .iter()
                .map(|row| row.project(names, context))
                .collect()),

            TupleExpr::Join { left, right } => {
                let left = self.evaluate(left, context)?;
                let right = self.evaluate(right, context)?;
                Ok(left
                    .iter()
                    .flat_map(|l| right.iter().filter_map(move |r| l.merge(r)))
                    .collect())
            }

            TupleExpr::LeftJoin {
                left,
                right,
                condition,
            } => {
                let left = self.evaluate(left, context)?;
                let right = self.evaluate(right, context)?;
                let mut results = Vec::new();
                for l in &left {
                    let mut matched = false;
                    for r in &right {
                        let Some(merged) = l.merge(r) else { continue };
                        let keep = match condition {
                            Some(cond) => evaluate_condition(cond, &merged, &self.functions)?,
                            None => true,
                        };
                        if keep {
                            matched = true;
                            results.push(merged);
                        }
                    }
                    if !matched {
                        results.push(l.clone());
                    }
                }
                Ok(results)
            }

            TupleExpr::Union { left, right } => {
                let mut rows = self.evaluate(left, context)?;
                rows.extend(self.evaluate(right, context)?);
                Ok(rows)
            }

            TupleExpr::Group {
                input,
                group_by,
                elements,
            } => self.eval_group(input, group_by, elements, context),

            TupleExpr::Distinct { input } => {
                let mut seen = HashSet::new();
                Ok(self
                    .evaluate(input, context)?
                    .into_iter()
                    .filter(|row| seen.insert(row.clone()))
                    .collect())
            }

            TupleExpr::Order { input, keys } => {
                let rows = self.evaluate(input, context)?;
                Ok(self.eval_order(rows, keys))
            }

            TupleExpr::Slice {
                input,
                offset,
                limit,
            } => {
                let rows = self.evaluate(input, context)?.into_iter().skip(*offset);
                Ok(match limit {
                    Some(n) => rows.take(*n).collect(),
                    None => rows.collect(),
                })
            }
        }
    }
}

impl std::fmt::Debug for StrictEvaluationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrictEvaluationStrategy")
            .field("functions", &self.functions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{AggregateExpr, AggregateOp, CompareOp, ExtensionElem, MathOp};
    use crate::evaluation::{MemoryTripleSource, Statement, TripleSource};

    fn people() -> StrictEvaluationStrategy {
        let source = MemoryTripleSource::new();
        source.add(Value::iri("ex:alice"), Value::iri("ex:age"), 30i64);
        source.add(Value::iri("ex:bob"), Value::iri("ex:age"), 25i64);
        source.add(Value::iri("ex:carol"), Value::iri("ex:age"), 41i64);
        source.add(Value::iri("ex:alice"), Value::iri("ex:knows"), Value::iri("ex:bob"));
        source.add(Value::iri("ex:bob"), Value::iri("ex:knows"), Value::iri("ex:bob"));
        StrictEvaluationStrategy::new(Arc::new(source))
    }

    fn age_pattern() -> TupleExpr {
        TupleExpr::pattern(
            TermPattern::var("p"),
            TermPattern::constant(Value::iri("ex:age")),
            TermPattern::var("age"),
        )
    }

    #[test]
    fn test_singleton_returns_context() {
        let strategy = StrictEvaluationStrategy::empty();
        let ctx = BindingSet::new().with("x", 1i64);
        assert_eq!(strategy.evaluate(&TupleExpr::SingletonSet, &ctx).unwrap(), vec![ctx]);
        assert!(strategy.evaluate(&TupleExpr::EmptySet, &BindingSet::new()).unwrap().is_empty());
    }

    #[test]
    fn test_pattern_uses_context_binding() {
        let strategy = people();
        let ctx = BindingSet::new().with("p", Value::iri("ex:bob"));
        let rows = strategy.evaluate(&age_pattern(), &ctx).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("age"), Some(&Value::Integer(25)));
    }

    #[test]
    fn test_pattern_repeated_variable() {
        let strategy = people();
        let expr = TupleExpr::pattern(
            TermPattern::var("x"),
            TermPattern::constant(Value::iri("ex:knows")),
            TermPattern::var("x"),
        );
        let rows = strategy.evaluate(&expr, &BindingSet::new()).unwrap();
        assert_eq!(rows, vec![BindingSet::new().with("x", Value::iri("ex:bob"))]);
    }

    #[test]
    fn test_filter_and_extension() {
        let strategy = people();
        let expr = TupleExpr::extension(
            TupleExpr::filter(
                age_pattern(),
                ValueExpr::compare(ValueExpr::var("age"), CompareOp::Gt, ValueExpr::lit(28i64)),
            ),
            vec![ExtensionElem::new(
                "next",
                ValueExpr::math(ValueExpr::var("age"), MathOp::Add, ValueExpr::lit(1i64)),
            )],
        );
        let rows = strategy.evaluate(&expr, &BindingSet::new()).unwrap();
        let next: Vec<&Value> = rows.iter().filter_map(|r| r.get("next")).collect();
        assert_eq!(next, vec![&Value::Integer(31), &Value::Integer(42)]);
    }

    #[test]
    fn test_filter_error_propagates() {
        let strategy = people();
        let expr = TupleExpr::filter(age_pattern(), ValueExpr::var("missing"));
        assert_eq!(
            strategy.evaluate(&expr, &BindingSet::new()).unwrap_err(),
            EvalError::UnboundVariable("missing".into())
        );
    }

    struct UnreachableStore;

    impl TripleSource for UnreachableStore {
        fn statements(
            &self,
            _subject: Option<&Value>,
            _predicate: Option<&Value>,
            _object: Option<&Value>,
        ) -> EvalResult<Vec<Statement>> {
            Err(EvalError::Source("store unreachable".into()))
        }
    }

    #[test]
    fn test_source_error_propagates() {
        let strategy = StrictEvaluationStrategy::new(Arc::new(UnreachableStore));
        let expr = TupleExpr::join(TupleExpr::SingletonSet, age_pattern());
        assert_eq!(
            strategy.evaluate(&expr, &BindingSet::new()).unwrap_err(),
            EvalError::Source("store unreachable".into())
        );
    }

    #[test]
    fn test_projection_keeps_context() {
        let strategy = people();
        let ctx = BindingSet::new().with("k", "v");
        let expr = TupleExpr::projection(age_pattern(), ["age"]);
        let rows = strategy.evaluate(&expr, &ctx).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.contains("k") && r.contains("age") && !r.contains("p")));
    }

    #[test]
    fn test_join_and_left_join() {
        let strategy = people();
        let knows = TupleExpr::pattern(
            TermPattern::var("p"),
            TermPattern::constant(Value::iri("ex:knows")),
            TermPattern::var("friend"),
        );
        let joined = strategy
            .evaluate(&TupleExpr::join(age_pattern(), knows.clone()), &BindingSet::new())
            .unwrap();
        assert_eq!(joined.len(), 2);

        let optional = strategy
            .evaluate(&TupleExpr::left_join(age_pattern(), knows, None), &BindingSet::new())
            .unwrap();
        assert_eq!(optional.len(), 3);
        assert_eq!(optional.iter().filter(|r| r.contains("friend")).count(), 2);
    }

    #[test]
    fn test_left_join_condition() {
        let strategy = StrictEvaluationStrategy::empty();
        let left = TupleExpr::Values {
            rows: vec![BindingSet::new().with("a", 1i64)],
        };
        let right = TupleExpr::Values {
            rows: vec![BindingSet::new().with("b", 2i64)],
        };
        let cond = ValueExpr::compare(ValueExpr::var("b"), CompareOp::Gt, ValueExpr::lit(5i64));
        let rows = strategy
            .evaluate(&TupleExpr::left_join(left, right, Some(cond)), &BindingSet::new())
            .unwrap();
        assert_eq!(rows, vec![BindingSet::new().with("a", 1i64)]);
    }

    #[test]
    fn test_values_merge_with_context() {
        let strategy = StrictEvaluationStrategy::empty();
        let expr = TupleExpr::Values {
            rows: vec![
                BindingSet::new().with("x", 1i64),
                BindingSet::new().with("x", 2i64),
            ],
        };
        let ctx = BindingSet::new().with("x", 2i64);
        assert_eq!(strategy.evaluate(&expr, &ctx).unwrap(), vec![ctx]);
    }

    #[test]
    fn test_group_with_keys() {
        let strategy = StrictEvaluationStrategy::empty();
        let input = TupleExpr::Values {
            rows: vec![
                BindingSet::new().with("g", "a").with("n", 1i64),
                BindingSet::new().with("g", "b").with("n", 5i64),
                BindingSet::new().with("g", "a").with("n", 2i64),
            ],
        };
        let expr = TupleExpr::group(
            input,
            ["g"],
            vec![GroupElem::new("total", AggregateExpr::new(AggregateOp::Sum, ValueExpr::var("n")))],
        );
        let rows = strategy.evaluate(&expr, &BindingSet::new()).unwrap();
        assert_eq!(
            rows,
            vec![
                BindingSet::new().with("g", "a").with("total", 3i64),
                BindingSet::new().with("g", "b").with("total", 5i64),
            ]
        );
    }

    #[test]
    fn test_group_over_empty_input() {
        let strategy = StrictEvaluationStrategy::empty();
        let elems = vec![
            GroupElem::new("a", AggregateExpr::new(AggregateOp::Max, ValueExpr::lit(1i64))),
            GroupElem::new("c", AggregateExpr::count_all()),
        ];
        let no_keys = TupleExpr::group(TupleExpr::EmptySet, Vec::<String>::new(), elems.clone());
        let rows = strategy.evaluate(&no_keys, &BindingSet::new()).unwrap();
        assert_eq!(rows, vec![BindingSet::new().with("a", 1i64).with("c", 0i64)]);

        let keyed = TupleExpr::group(TupleExpr::EmptySet, ["g"], elems);
        assert!(strategy.evaluate(&keyed, &BindingSet::new()).unwrap().is_empty());
    }

    #[test]
    fn test_distinct_order_slice() {
        let strategy = StrictEvaluationStrategy::empty();
        let input = TupleExpr::Values {
            rows: vec![
                BindingSet::new().with("x", 3i64),
                BindingSet::new().with("x", 1i64),
                BindingSet::new().with("x", 3i64),
                BindingSet::new().with("x", 2i64),
            ],
        };
        let expr = TupleExpr::Slice {
            input: Box::new(TupleExpr::Order {
                input: Box::new(TupleExpr::Distinct {
                    input: Box::new(input),
                }),
                keys: vec![OrderKey {
                    name: "x".into(),
                    ascending: false,
                }],
            }),
            offset: 1,
            limit: Some(1),
        };
        let rows = strategy.evaluate(&expr, &BindingSet::new()).unwrap();
        assert_eq!(rows, vec![BindingSet::new().with("x", 2i64)]);
    }

    #[test]
    fn test_rebinding_is_an_error() {
        let strategy = StrictEvaluationStrategy::empty();
        let ctx = BindingSet::new().with("x", 1i64);
        let bind = TupleExpr::extension(
            TupleExpr::SingletonSet,
            vec![ExtensionElem::new("x", ValueExpr::lit(2i64))],
        );
        assert_eq!(
            strategy.evaluate(&bind, &ctx).unwrap_err(),
            EvalError::AlreadyBound("x".into())
        );

        let group = TupleExpr::group(
            TupleExpr::SingletonSet,
            Vec::<String>::new(),
            vec![GroupElem::new("x", AggregateExpr::count_all())],
        );
        assert_eq!(
            strategy.evaluate(&group, &ctx).unwrap_err(),
            EvalError::AlreadyBound("x".into())
        );
    }

    #[test]
    fn test_union_keeps_duplicates() {
        let strategy = StrictEvaluationStrategy::empty();
        let expr = TupleExpr::union(TupleExpr::SingletonSet, TupleExpr::SingletonSet);
        assert_eq!(strategy.evaluate(&expr, &BindingSet::new()).unwrap().len(), 2);
    }
}
