//! Filter simplification: merges stacked filters and drops filters whose
//! condition is the literal `true`.

use crate::algebra::{BindingSet, TupleExpr, ValueExpr};
use crate::tuple::Value;

use super::pipeline::QueryOptimizer;

/// Merges `Filter(Filter(input, inner), outer)` into
/// `Filter(input, inner && outer)`.
///
/// `&&` evaluates its left operand first and short-circuits, so the merged
/// filter fails exactly when the stacked filters fail. With several failing
/// rows the first error reported may differ.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterSimplifier;

impl FilterSimplifier {
    fn simplify(&self, expr: &TupleExpr) -> TupleExpr {
        let simplified = expr.map_children(|child| self.simplify(child));
        match simplified {
            TupleExpr::Filter { input, condition } if is_true(&condition) => *input,
            TupleExpr::Filter { input, condition } => match *input {
                TupleExpr::Filter {
                    input: inner_input,
                    condition: inner_condition,
                } => TupleExpr::Filter {
                    input: inner_input,
                    condition: ValueExpr::and(inner_condition, condition),
                },
                input => TupleExpr::filter(input, condition),
            },
            other => other,
        }
    }
}

fn is_true(condition: &ValueExpr) -> bool {
    condition.as_literal() == Some(&Value::Boolean(true))
}

impl QueryOptimizer for FilterSimplifier {
    fn name(&self) -> &str {
        "FilterSimplification"
    }

    fn optimize(&self, expr: &TupleExpr, _bindings: &BindingSet) -> TupleExpr {
        self.simplify(expr)
    }
}
