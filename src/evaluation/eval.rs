//! Value expression evaluation.

use std::cmp::Ordering;

use super::error::{EvalError, EvalResult};
use super::functions::FunctionRegistry;
use crate::algebra::{BindingSet, CompareOp, MathOp, ValueExpr};
use crate::tuple::Value;

/// Evaluate an expression against a binding set.
pub fn evaluate(
    expr: &ValueExpr,
    bindings: &BindingSet,
    functions: &FunctionRegistry,
) -> EvalResult<Value> {
    match expr {
        ValueExpr::Var(name) => bindings
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnboundVariable(name.clone())),

        ValueExpr::Literal(v) => Ok(v.clone()),

        ValueExpr::And(left, right) => {
            if !effective_boolean(&evaluate(left, bindings, functions)?)? {
                return Ok(Value::Boolean(false));
            }
            let r = evaluate(right, bindings, functions)?;
            Ok(Value::Boolean(effective_boolean(&r)?))
        }

        ValueExpr::Or(left, right) => {
            if effective_boolean(&evaluate(left, bindings, functions)?)? {
                return Ok(Value::Boolean(true));
            }
            let r = evaluate(right, bindings, functions)?;
            Ok(Value::Boolean(effective_boolean(&r)?))
        }

        ValueExpr::Not(inner) => {
            let v = evaluate(inner, bindings, functions)?;
            Ok(Value::Boolean(!effective_boolean(&v)?))
        }

        ValueExpr::Compare { left, op, right } => {
            let l = evaluate(left, bindings, functions)?;
            let r = evaluate(right, bindings, functions)?;
            compare_values(&l, *op, &r).map(Value::Boolean)
        }

        ValueExpr::Math { left, op, right } => {
            let l = evaluate(left, bindings, functions)?;
            let r = evaluate(right, bindings, functions)?;
            eval_math(&l, *op, &r)
        }

        ValueExpr::Bound(name) => Ok(Value::Boolean(bindings.contains(name))),

        ValueExpr::FunctionCall { name, args } => match name.to_lowercase().as_str() {
            "coalesce" => eval_coalesce(name, args, bindings, functions),
            "if" if args.len() == 3 => {
                let cond = evaluate(&args[0], bindings, functions)?;
                if effective_boolean(&cond)? {
                    evaluate(&args[1], bindings, functions)
                } else {
                    evaluate(&args[2], bindings, functions)
                }
            }
            _ => {
                let evaluated: Vec<Value> = args
                    .iter()
                    .map(|a| evaluate(a, bindings, functions))
                    .collect::<EvalResult<_>>()?;
                functions.call(name, &evaluated)
            }
        },
    }
}

/// Evaluate a condition, requiring a boolean result.
pub fn evaluate_condition(
    expr: &ValueExpr,
    bindings: &BindingSet,
    functions: &FunctionRegistry,
) -> EvalResult<bool> {
    effective_boolean(&evaluate(expr, bindings, functions)?)
}

/// The boolean value of a condition result. Only booleans qualify.
pub fn effective_boolean(v: &Value) -> EvalResult<bool> {
    v.as_bool()
        .ok_or_else(|| EvalError::NotBoolean(v.to_string()))
}

fn eval_coalesce(
    name: &str,
    args: &[ValueExpr],
    bindings: &BindingSet,
    functions: &FunctionRegistry,
) -> EvalResult<Value> {
    let mut last_err = EvalError::Arity {
        function: name.to_lowercase(),
        expected: "at least 1".into(),
        actual: 0,
    };
    for arg in args {
        match evaluate(arg, bindings, functions) {
            Ok(v) => return Ok(v),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Compare two values under an operator.
///
/// Numbers compare numerically across integer/double. Equality across
/// other kinds is simply false; ordering across them is a type error.
pub fn compare_values(left: &Value, op: CompareOp, right: &Value) -> EvalResult<bool> {
    let ord = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (l, r) if l.is_numeric() && r.is_numeric() => {
            let (a, b) = (numeric(l)?, numeric(r)?);
            a.total_cmp(&b)
        }
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Iri(a), Value::Iri(b)) if op.is_equality() => a.cmp(b),
        _ if op.is_equality() => return Ok(op == CompareOp::Ne),
        (l, r) => {
            return Err(EvalError::type_mismatch(l.type_name(), r.type_name()));
        }
    };
    Ok(op.holds(ord))
}

fn numeric(v: &Value) -> EvalResult<f64> {
    v.as_f64()
        .ok_or_else(|| EvalError::type_mismatch("numeric", v.type_name()))
}

fn eval_math(left: &Value, op: MathOp, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            let result = match op {
                MathOp::Add => a.checked_add(*b),
                MathOp::Sub => a.checked_sub(*b),
                MathOp::Mul => a.checked_mul(*b),
                // integer division yields a double
                MathOp::Div => {
                    if *b == 0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    return Ok(Value::Double(*a as f64 / *b as f64));
                }
            };
            result.map(Value::Integer).ok_or(EvalError::Overflow)
        }
        _ => {
            let (a, b) = (numeric(left)?, numeric(right)?);
            let result = match op {
                MathOp::Add => a + b,
                MathOp::Sub => a - b,
                MathOp::Mul => a * b,
                MathOp::Div => {
                    if b == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a / b
                }
            };
            Ok(Value::Double(result))
        }
    }
}

/// Order two optional values: unbound first, then the value total order.
pub fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(b),
    }
}
