//! Constant folding.
//!
//! Replaces variables bound in the known binding set with their values and
//! evaluates sub-expressions whose operands are all literals. Evaluation goes
//! through the [`EvaluationStrategy`], so a folded literal is exactly what
//! execution would have produced. A sub-expression whose evaluation fails is
//! left in place, so the same error surfaces at execution time.

use std::sync::Arc;

use tracing::{debug, trace};

use super::pipeline::QueryOptimizer;
use crate::algebra::{BindingSet, ExtensionElem, GroupElem, TupleExpr, ValueExpr};
use crate::evaluation::EvaluationStrategy;
use crate::tuple::Value;

/// Folds constant sub-expressions of an algebra tree.
pub struct ConstantOptimizer {
    strategy: Arc<dyn EvaluationStrategy>,
}

impl ConstantOptimizer {
    pub fn new(strategy: Arc<dyn EvaluationStrategy>) -> Self {
        Self { strategy }
    }

    /// Fold a value expression under the known bindings.
    pub fn fold_value(&self, expr: &ValueExpr, bindings: &BindingSet) -> ValueExpr {
        match expr {
            ValueExpr::Literal(_) => expr.clone(),

            ValueExpr::Var(name) => match bindings.get(name) {
                Some(v) => ValueExpr::Literal(v.clone()),
                None => expr.clone(),
            },

            ValueExpr::Bound(name) => {
                if bindings.contains(name) {
                    ValueExpr::lit(true)
                } else {
                    expr.clone()
                }
            }

            ValueExpr::And(l, r) => self.fold_operator(ValueExpr::and(
                self.fold_value(l, bindings),
                self.fold_value(r, bindings),
            )),

            ValueExpr::Or(l, r) => self.fold_operator(ValueExpr::or(
                self.fold_value(l, bindings),
                self.fold_value(r, bindings),
            )),

            ValueExpr::Not(inner) => {
                self.fold_operator(ValueExpr::not(self.fold_value(inner, bindings)))
            }

            ValueExpr::Compare { left, op, right } => self.fold_operator(ValueExpr::compare(
                self.fold_value(left, bindings),
                *op,
                self.fold_value(right, bindings),
            )),

            ValueExpr::Math { left, op, right } => self.fold_operator(ValueExpr::math(
                self.fold_value(left, bindings),
                *op,
                self.fold_value(right, bindings),
            )),

            ValueExpr::FunctionCall { name, args } => {
                let args: Vec<ValueExpr> =
                    args.iter().map(|a| self.fold_value(a, bindings)).collect();
                self.fold_call(name, args)
            }
        }
    }

    /// Evaluate an operator node whose operands are all literals.
    fn fold_operator(&self, expr: ValueExpr) -> ValueExpr {
        if !expr.children().iter().all(|c| c.is_literal()) {
            return expr;
        }
        match self.strategy.evaluate_value(&expr, &BindingSet::new()) {
            Ok(value) => {
                trace!("folded {} to {}", expr, value);
                ValueExpr::Literal(value)
            }
            Err(e) => {
                debug!("not folding {}: {}", expr, e);
                expr
            }
        }
    }

    fn fold_call(&self, name: &str, args: Vec<ValueExpr>) -> ValueExpr {
        if !self.strategy.is_deterministic(name) {
            return ValueExpr::call(name, args);
        }
        let values: Option<Vec<Value>> = args.iter().map(|a| a.as_literal().cloned()).collect();
        let Some(values) = values else {
            return ValueExpr::call(name, args);
        };
        match self.strategy.evaluate_function(name, &values) {
            Ok(value) => {
                trace!("folded call {} to {}", name, value);
                ValueExpr::Literal(value)
            }
            Err(e) => {
                debug!("not folding call {}: {}", name, e);
                ValueExpr::call(name, args)
            }
        }
    }

    fn fold_tuple(&self, expr: &TupleExpr, bindings: &BindingSet) -> TupleExpr {
        let folded = expr.map_children(|child| self.fold_tuple(child, bindings));
        match folded {
            TupleExpr::Filter { input, condition } => {
                let condition = self.fold_value(&condition, bindings);
                if condition.as_literal() == Some(&Value::Boolean(true)) {
                    *input
                } else {
                    TupleExpr::Filter { input, condition }
                }
            }

            TupleExpr::Extension { input, elements } => TupleExpr::Extension {
                input,
                elements: elements
                    .into_iter()
                    .map(|e| ExtensionElem::new(e.name, self.fold_value(&e.expr, bindings)))
                    .collect(),
            },

            TupleExpr::LeftJoin {
                left,
                right,
                condition,
            } => TupleExpr::LeftJoin {
                left,
                right,
                condition: condition.map(|c| self.fold_value(&c, bindings)),
            },

            // only the argument folds; the aggregate keeps its empty-group result
            TupleExpr::Group {
                input,
                group_by,
                elements,
            } => TupleExpr::Group {
                input,
                group_by,
                elements: elements
                    .into_iter()
                    .map(|mut e| {
                        e.aggregate.arg = e.aggregate.arg.map(|a| self.fold_value(&a, bindings));
                        GroupElem::new(e.name, e.aggregate)
                    })
                    .collect(),
            },

            other => other,
        }
    }
}

impl QueryOptimizer for ConstantOptimizer {
    fn name(&self) -> &str {
        "ConstantFolding"
    }

    fn optimize(&self, expr: &TupleExpr, bindings: &BindingSet) -> TupleExpr {
        self.fold_tuple(expr, bindings)
    }
}
