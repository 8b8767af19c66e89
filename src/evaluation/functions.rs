//! Built-in and user-registered functions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::{EvalError, EvalResult};
use crate::tuple::Value;

/// Signature of a function implementation: fully evaluated arguments in,
/// value out.
pub type FunctionImpl = Arc<dyn Fn(&[Value]) -> EvalResult<Value> + Send + Sync>;

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == *k,
            Arity::AtLeast(k) => n >= *k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "{}", k),
            Arity::AtLeast(k) => write!(f, "at least {}", k),
        }
    }
}

/// A registered function.
#[derive(Clone)]
pub struct Function {
    arity: Arity,
    deterministic: bool,
    implementation: FunctionImpl,
}

impl Function {
    pub fn new(
        arity: Arity,
        deterministic: bool,
        implementation: impl Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            arity,
            deterministic,
            implementation: Arc::new(implementation),
        }
    }

    /// Whether repeated calls with equal arguments always return equal
    /// results. Only deterministic functions may be folded ahead of time.
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("arity", &self.arity)
            .field("deterministic", &self.deterministic)
            .finish()
    }
}

/// Function lookup by case-insensitive name.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Function>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in function set.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("concat", Function::new(Arity::AtLeast(0), true, concat));
        registry.register("str", Function::new(Arity::Exact(1), true, |a| {
            Ok(Value::String(a[0].lexical()))
        }));
        registry.register("strlen", Function::new(Arity::Exact(1), true, |a| {
            Ok(Value::Integer(string_arg(&a[0])?.chars().count() as i64))
        }));
        registry.register("ucase", Function::new(Arity::Exact(1), true, |a| {
            Ok(Value::String(string_arg(&a[0])?.to_uppercase()))
        }));
        registry.register("lcase", Function::new(Arity::Exact(1), true, |a| {
            Ok(Value::String(string_arg(&a[0])?.to_lowercase()))
        }));
        registry.register("contains", Function::new(Arity::Exact(2), true, |a| {
            Ok(Value::Boolean(string_arg(&a[0])?.contains(string_arg(&a[1])?)))
        }));
        registry.register("strstarts", Function::new(Arity::Exact(2), true, |a| {
            Ok(Value::Boolean(string_arg(&a[0])?.starts_with(string_arg(&a[1])?)))
        }));
        registry.register("strends", Function::new(Arity::Exact(2), true, |a| {
            Ok(Value::Boolean(string_arg(&a[0])?.ends_with(string_arg(&a[1])?)))
        }));
        registry.register("abs", Function::new(Arity::Exact(1), true, |a| {
            numeric_unary(&a[0], |n| n.checked_abs(), f64::abs)
        }));
        registry.register("ceil", Function::new(Arity::Exact(1), true, |a| {
            numeric_unary(&a[0], Some, f64::ceil)
        }));
        registry.register("floor", Function::new(Arity::Exact(1), true, |a| {
            numeric_unary(&a[0], Some, f64::floor)
        }));
        registry.register("round", Function::new(Arity::Exact(1), true, |a| {
            numeric_unary(&a[0], Some, f64::round)
        }));
        // Lazy in the evaluator; with literal arguments nothing can fail, so
        // the first argument wins.
        registry.register("coalesce", Function::new(Arity::AtLeast(1), true, |a| {
            Ok(a[0].clone())
        }));
        registry.register("if", Function::new(Arity::Exact(3), true, |a| {
            match a[0].as_bool() {
                Some(true) => Ok(a[1].clone()),
                Some(false) => Ok(a[2].clone()),
                None => Err(EvalError::NotBoolean(a[0].to_string())),
            }
        }));
        registry.register("now", Function::new(Arity::Exact(0), false, |_| {
            Ok(Value::String(chrono::Utc::now().to_rfc3339()))
        }));
        registry
    }

    /// Register (or replace) a function.
    pub fn register(&mut self, name: &str, function: Function) {
        self.functions.insert(name.to_lowercase(), function);
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(&name.to_lowercase())
    }

    /// Check if a function is known and deterministic.
    pub fn is_deterministic(&self, name: &str) -> bool {
        self.get(name).is_some_and(Function::is_deterministic)
    }

    /// Call a function with evaluated arguments.
    pub fn call(&self, name: &str, args: &[Value]) -> EvalResult<Value> {
        let function = self
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        if !function.arity.accepts(args.len()) {
            return Err(EvalError::Arity {
                function: name.to_lowercase(),
                expected: function.arity.to_string(),
                actual: args.len(),
            });
        }
        (function.implementation)(args)
    }
}

fn string_arg(v: &Value) -> EvalResult<&str> {
    v.as_str()
        .ok_or_else(|| EvalError::type_mismatch("string", v.type_name()))
}

fn concat(args: &[Value]) -> EvalResult<Value> {
    let mut out = String::new();
    for arg in args {
        out.push_str(string_arg(arg)?);
    }
    Ok(Value::String(out))
}

fn numeric_unary(
    v: &Value,
    int_op: impl Fn(i64) -> Option<i64>,
    float_op: impl Fn(f64) -> f64,
) -> EvalResult<Value> {
    match v {
        Value::Integer(n) => int_op(*n).map(Value::Integer).ok_or(EvalError::Overflow),
        Value::Double(d) => Ok(Value::Double(float_op(*d))),
        other => Err(EvalError::type_mismatch("numeric", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat() {
        let registry = FunctionRegistry::standard();
        let v = registry
            .call("CONCAT", &[Value::string("foo"), Value::string("bar")])
            .unwrap();
        assert_eq!(v, Value::string("foobar"));
    }

    #[test]
    fn test_concat_rejects_numbers() {
        let registry = FunctionRegistry::standard();
        let err = registry
            .call("concat", &[Value::string("a"), Value::Integer(1)])
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn test_arity_checked() {
        let registry = FunctionRegistry::standard();
        let err = registry.call("strlen", &[]).unwrap_err();
        assert!(matches!(err, EvalError::Arity { actual: 0, .. }));
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::standard();
        assert_eq!(
            registry.call("nope", &[]).unwrap_err(),
            EvalError::UnknownFunction("nope".into())
        );
    }

    #[test]
    fn test_now_is_not_deterministic() {
        let registry = FunctionRegistry::standard();
        assert!(!registry.is_deterministic("now"));
        assert!(registry.is_deterministic("ucase"));
        assert!(!registry.is_deterministic("missing"));
    }

    #[test]
    fn test_numeric_functions() {
        let registry = FunctionRegistry::standard();
        assert_eq!(registry.call("abs", &[Value::Integer(-3)]).unwrap(), Value::Integer(3));
        assert_eq!(registry.call("floor", &[Value::Double(2.7)]).unwrap(), Value::Double(2.0));
        assert_eq!(
            registry.call("abs", &[Value::Integer(i64::MIN)]).unwrap_err(),
            EvalError::Overflow
        );
    }

    #[test]
    fn test_custom_function() {
        let mut registry = FunctionRegistry::new();
        registry.register("Twice", Function::new(Arity::Exact(1), true, |a| match &a[0] {
            Value::Integer(n) => Ok(Value::Integer(n * 2)),
            other => Err(EvalError::type_mismatch("integer", other.type_name())),
        }));
        assert_eq!(registry.call("twice", &[Value::Integer(4)]).unwrap(), Value::Integer(8));
    }
}
