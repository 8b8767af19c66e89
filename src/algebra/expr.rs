//! Value expressions: the scalar part of the algebra tree.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::tuple::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Interpret an ordering under this operator.
    pub fn holds(&self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        }
    }

    /// Check if this operator only asks about equality.
    pub fn is_equality(&self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for MathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MathOp::Add => "+",
            MathOp::Sub => "-",
            MathOp::Mul => "*",
            MathOp::Div => "/",
        };
        write!(f, "{}", s)
    }
}

/// A scalar expression evaluated against a binding set.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    /// Variable reference.
    Var(String),
    /// Literal value.
    Literal(Value),
    /// Logical conjunction.
    And(Box<ValueExpr>, Box<ValueExpr>),
    /// Logical disjunction.
    Or(Box<ValueExpr>, Box<ValueExpr>),
    /// Logical negation.
    Not(Box<ValueExpr>),
    Compare {
        left: Box<ValueExpr>,
        op: CompareOp,
        right: Box<ValueExpr>,
    },
    Math {
        left: Box<ValueExpr>,
        op: MathOp,
        right: Box<ValueExpr>,
    },
    /// BOUND(?var).
    Bound(String),
    /// Named function call.
    FunctionCall { name: String, args: Vec<ValueExpr> },
}

impl ValueExpr {
    pub fn var(name: impl Into<String>) -> Self {
        ValueExpr::Var(name.into())
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        ValueExpr::Literal(value.into())
    }

    pub fn and(left: ValueExpr, right: ValueExpr) -> Self {
        ValueExpr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: ValueExpr, right: ValueExpr) -> Self {
        ValueExpr::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: ValueExpr) -> Self {
        ValueExpr::Not(Box::new(inner))
    }

    pub fn compare(left: ValueExpr, op: CompareOp, right: ValueExpr) -> Self {
        ValueExpr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn math(left: ValueExpr, op: MathOp, right: ValueExpr) -> Self {
        ValueExpr::Math {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<ValueExpr>) -> Self {
        ValueExpr::FunctionCall {
            name: name.into(),
            args,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            ValueExpr::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, ValueExpr::Literal(_))
    }

    /// Direct sub-expressions.
    pub fn children(&self) -> Vec<&ValueExpr> {
        match self {
            ValueExpr::Var(_) | ValueExpr::Literal(_) | ValueExpr::Bound(_) => Vec::new(),
            ValueExpr::And(l, r) | ValueExpr::Or(l, r) => vec![l.as_ref(), r.as_ref()],
            ValueExpr::Not(inner) => vec![inner.as_ref()],
            ValueExpr::Compare { left, right, .. } | ValueExpr::Math { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            ValueExpr::FunctionCall { args, .. } => args.iter().collect(),
        }
    }

    /// Visit this expression and all sub-expressions, pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a ValueExpr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Variables referenced anywhere in the expression.
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.walk(&mut |e| match e {
            ValueExpr::Var(name) | ValueExpr::Bound(name) => {
                vars.insert(name.clone());
            }
            _ => {}
        });
        vars
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Var(name) => write!(f, "?{}", name),
            ValueExpr::Literal(v) => write!(f, "{}", v),
            ValueExpr::And(l, r) => write!(f, "({} && {})", l, r),
            ValueExpr::Or(l, r) => write!(f, "({} || {})", l, r),
            ValueExpr::Not(inner) => write!(f, "!{}", inner),
            ValueExpr::Compare { left, op, right } => write!(f, "({} {} {})", left, op, right),
            ValueExpr::Math { left, op, right } => write!(f, "({} {} {})", left, op, right),
            ValueExpr::Bound(name) => write!(f, "BOUND(?{})", name),
            ValueExpr::FunctionCall { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name.to_uppercase(), args.join(", "))
            }
        }
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Sample,
    GroupConcat { separator: String },
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateOp::Count => write!(f, "COUNT"),
            AggregateOp::Sum => write!(f, "SUM"),
            AggregateOp::Avg => write!(f, "AVG"),
            AggregateOp::Min => write!(f, "MIN"),
            AggregateOp::Max => write!(f, "MAX"),
            AggregateOp::Sample => write!(f, "SAMPLE"),
            AggregateOp::GroupConcat { .. } => write!(f, "GROUP_CONCAT"),
        }
    }
}

/// An aggregate over the solutions of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub op: AggregateOp,
    /// Argument; `None` means `*` and is only meaningful for COUNT.
    pub arg: Option<ValueExpr>,
    pub distinct: bool,
}

impl AggregateExpr {
    pub fn new(op: AggregateOp, arg: ValueExpr) -> Self {
        Self {
            op,
            arg: Some(arg),
            distinct: false,
        }
    }

    /// COUNT(*).
    pub fn count_all() -> Self {
        Self {
            op: AggregateOp::Count,
            arg: None,
            distinct: false,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.op)?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        match &self.arg {
            Some(arg) => write!(f, "{}", arg)?,
            None => write!(f, "*")?,
        }
        write!(f, ")")
    }
}
