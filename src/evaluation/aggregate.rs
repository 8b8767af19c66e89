//! Aggregate evaluation over groups of solutions.

use std::collections::HashSet;

use super::error::{EvalError, EvalResult};
use super::eval::evaluate;
use super::functions::FunctionRegistry;
use crate::algebra::{AggregateExpr, AggregateOp, BindingSet};
use crate::tuple::Value;

/// Evaluate an aggregate over the solutions of one group.
///
/// Returns `Ok(None)` when the aggregate leaves its variable unbound.
///
/// An empty group never raises an error: COUNT and SUM yield 0, GROUP_CONCAT
/// yields the empty string, and MIN/MAX/AVG/SAMPLE evaluate their argument
/// once against `context`; if that succeeds the aggregate is computed over
/// that single value, otherwise the result is unbound.
pub fn evaluate_aggregate(
    aggregate: &AggregateExpr,
    rows: &[BindingSet],
    context: &BindingSet,
    functions: &FunctionRegistry,
) -> EvalResult<Option<Value>> {
    if rows.is_empty() {
        return Ok(empty_group_result(aggregate, context, functions));
    }

    let values = match &aggregate.arg {
        None => {
            if aggregate.op != AggregateOp::Count {
                return Err(EvalError::type_mismatch("expression", "*"));
            }
            let count = if aggregate.distinct {
                rows.iter().collect::<HashSet<_>>().len()
            } else {
                rows.len()
            };
            return Ok(Some(Value::Integer(count as i64)));
        }
        Some(arg) => {
            let mut values = Vec::with_capacity(rows.len());
            for row in rows {
                match evaluate(arg, row, functions) {
                    Ok(v) => values.push(v),
                    // unbound contributes no value
                    Err(EvalError::UnboundVariable(_)) => {}
                    Err(e) => return Err(e),
                }
            }
            values
        }
    };

    let values = if aggregate.distinct {
        let mut seen = HashSet::new();
        values.into_iter().filter(|v| seen.insert(v.clone())).collect()
    } else {
        values
    };

    aggregate_values(&aggregate.op, values)
}

fn empty_group_result(
    aggregate: &AggregateExpr,
    context: &BindingSet,
    functions: &FunctionRegistry,
) -> Option<Value> {
    match &aggregate.op {
        AggregateOp::Count | AggregateOp::Sum => Some(Value::Integer(0)),
        AggregateOp::GroupConcat { .. } => Some(Value::String(String::new())),
        op => {
            let arg = aggregate.arg.as_ref()?;
            let value = evaluate(arg, context, functions).ok()?;
            aggregate_values(op, vec![value]).ok().flatten()
        }
    }
}

fn aggregate_values(op: &AggregateOp, values: Vec<Value>) -> EvalResult<Option<Value>> {
    match op {
        AggregateOp::Count => Ok(Some(Value::Integer(values.len() as i64))),
        AggregateOp::Sum => sum(&values).map(Some),
        AggregateOp::Avg => {
            if values.is_empty() {
                return Ok(Some(Value::Integer(0)));
            }
            let total = sum(&values)?;
            let total = total.as_f64().unwrap_or_default();
            Ok(Some(Value::Double(total / values.len() as f64)))
        }
        AggregateOp::Min => Ok(values.into_iter().min()),
        AggregateOp::Max => Ok(values.into_iter().max()),
        AggregateOp::Sample => Ok(values.into_iter().next()),
        AggregateOp::GroupConcat { separator } => {
            let parts: Vec<String> = values.iter().map(Value::lexical).collect();
            Ok(Some(Value::String(parts.join(separator))))
        }
    }
}

fn sum(values: &[Value]) -> EvalResult<Value> {
    let mut int_total: i64 = 0;
    let mut float_total: Option<f64> = None;
    for v in values {
        match v {
            Value::Integer(n) if float_total.is_none() => {
                int_total = int_total.checked_add(*n).ok_or(EvalError::Overflow)?;
            }
            Value::Integer(n) => {
                float_total = float_total.map(|t| t + *n as f64);
            }
            Value::Double(d) => {
                float_total = Some(float_total.unwrap_or(int_total as f64) + d);
            }
            other => return Err(EvalError::type_mismatch("numeric", other.type_name())),
        }
    }
    Ok(match float_total {
        Some(t) => Value::Double(t),
        None => Value::Integer(int_total),
    })
}
