//! Tuple expressions: the relational part of the algebra tree.
//!
//! Tuple expressions describe *what* a query computes over binding sets.
//! They are immutable; rewriting produces new trees.

use std::collections::BTreeSet;
use std::fmt;

use super::bindings::BindingSet;
use super::expr::{AggregateExpr, ValueExpr};
use crate::tuple::Value;

/// One position of a statement pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum TermPattern {
    Var(String),
    Const(Value),
}

impl TermPattern {
    pub fn var(name: impl Into<String>) -> Self {
        TermPattern::Var(name.into())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        TermPattern::Const(value.into())
    }
}

impl fmt::Display for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermPattern::Var(name) => write!(f, "?{}", name),
            TermPattern::Const(v) => write!(f, "{}", v),
        }
    }
}

/// `BIND(expr AS ?name)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionElem {
    pub name: String,
    pub expr: ValueExpr,
}

impl ExtensionElem {
    pub fn new(name: impl Into<String>, expr: ValueExpr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

/// `(aggregate AS ?name)` inside a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupElem {
    pub name: String,
    pub aggregate: AggregateExpr,
}

impl GroupElem {
    pub fn new(name: impl Into<String>, aggregate: AggregateExpr) -> Self {
        Self {
            name: name.into(),
            aggregate,
        }
    }
}

/// Sort key for [`TupleExpr::Order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub name: String,
    pub ascending: bool,
}

/// A relational algebra expression over binding sets.
#[derive(Debug, Clone, PartialEq)]
pub enum TupleExpr {
    /// Exactly one solution: the evaluation context.
    SingletonSet,

    /// No solutions.
    EmptySet,

    /// Match a (subject, predicate, object) pattern against the triple source.
    StatementPattern {
        subject: TermPattern,
        predicate: TermPattern,
        object: TermPattern,
    },

    /// Inline solutions.
    Values { rows: Vec<BindingSet> },

    /// Keep solutions for which the condition is true.
    Filter {
        input: Box<TupleExpr>,
        condition: ValueExpr,
    },

    /// Bind computed values to new names.
    Extension {
        input: Box<TupleExpr>,
        elements: Vec<ExtensionElem>,
    },

    /// Keep only the named variables.
    Projection {
        input: Box<TupleExpr>,
        names: Vec<String>,
    },

    /// Compatible merge of both sides.
    Join {
        left: Box<TupleExpr>,
        right: Box<TupleExpr>,
    },

    /// Optional right side.
    LeftJoin {
        left: Box<TupleExpr>,
        right: Box<TupleExpr>,
        condition: Option<ValueExpr>,
    },

    /// Solutions of both sides (bag semantics).
    Union {
        left: Box<TupleExpr>,
        right: Box<TupleExpr>,
    },

    /// Group with aggregates.
    Group {
        input: Box<TupleExpr>,
        group_by: Vec<String>,
        elements: Vec<GroupElem>,
    },

    /// Remove duplicate solutions.
    Distinct { input: Box<TupleExpr> },

    /// Sort solutions.
    Order {
        input: Box<TupleExpr>,
        keys: Vec<OrderKey>,
    },

    /// Offset and limit.
    Slice {
        input: Box<TupleExpr>,
        offset: usize,
        limit: Option<usize>,
    },
}

impl TupleExpr {
    pub fn pattern(subject: TermPattern, predicate: TermPattern, object: TermPattern) -> Self {
        TupleExpr::StatementPattern {
            subject,
            predicate,
            object,
        }
    }

    pub fn filter(input: TupleExpr, condition: ValueExpr) -> Self {
        TupleExpr::Filter {
            input: Box::new(input),
            condition,
        }
    }

    pub fn extension(input: TupleExpr, elements: Vec<ExtensionElem>) -> Self {
        TupleExpr::Extension {
            input: Box::new(input),
            elements,
        }
    }

    pub fn projection<S: Into<String>>(input: TupleExpr, names: impl IntoIterator<Item = S>) -> Self {
        TupleExpr::Projection {
            input: Box::new(input),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn join(left: TupleExpr, right: TupleExpr) -> Self {
        TupleExpr::Join {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn left_join(left: TupleExpr, right: TupleExpr, condition: Option<ValueExpr>) -> Self {
        TupleExpr::LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            condition,
        }
    }

    pub fn union(left: TupleExpr, right: TupleExpr) -> Self {
        TupleExpr::Union {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn group<S: Into<String>>(
        input: TupleExpr,
        group_by: impl IntoIterator<Item = S>,
        elements: Vec<GroupElem>,
    ) -> Self {
        TupleExpr::Group {
            input: Box::new(input),
            group_by: group_by.into_iter().map(Into::into).collect(),
            elements,
        }
    }

    /// Direct children.
    pub fn children(&self) -> Vec<&TupleExpr> {
        match self {
            TupleExpr::SingletonSet
            | TupleExpr::EmptySet
            | TupleExpr::StatementPattern { .. }
            | TupleExpr::Values { .. } => Vec::new(),
            TupleExpr::Filter { input, .. }
            | TupleExpr::Extension { input, .. }
            | TupleExpr::Projection { input, .. }
            | TupleExpr::Group { input, .. }
            | TupleExpr::Distinct { input }
            | TupleExpr::Order { input, .. }
            | TupleExpr::Slice { input, .. } => vec![input.as_ref()],
            TupleExpr::Join { left, right }
            | TupleExpr::LeftJoin { left, right, .. }
            | TupleExpr::Union { left, right } => vec![left.as_ref(), right.as_ref()],
        }
    }

    /// Rebuild this node with each child replaced by `f(child)`.
    pub fn map_children(&self, mut f: impl FnMut(&TupleExpr) -> TupleExpr) -> TupleExpr {
        let mut map = |e: &TupleExpr| Box::new(f(e));
        match self {
            TupleExpr::SingletonSet
            | TupleExpr::EmptySet
            | TupleExpr::StatementPattern { .. }
            | TupleExpr::Values { .. } => self.clone(),
            TupleExpr::Filter { input, condition } => TupleExpr::Filter {
                input: map(input),
                condition: condition.clone(),
            },
            TupleExpr::Extension { input, elements } => TupleExpr::Extension {
                input: map(input),
                elements: elements.clone(),
            },
            TupleExpr::Projection { input, names } => TupleExpr::Projection {
                input: map(input),
                names: names.clone(),
            },
            TupleExpr::Join { left, right } => TupleExpr::Join {
                left: map(left),
                right: map(right),
            },
            TupleExpr::LeftJoin {
                left,
                right,
                condition,
            } => TupleExpr::LeftJoin {
                left: map(left),
                right: map(right),
                condition: condition.clone(),
            },
            TupleExpr::Union { left, right } => TupleExpr::Union {
                left: map(left),
                right: map(right),
            },
            TupleExpr::Group {
                input,
                group_by,
                elements,
            } => TupleExpr::Group {
                input: map(input),
                group_by: group_by.clone(),
                elements: elements.clone(),
            },
            TupleExpr::Distinct { input } => TupleExpr::Distinct { input: map(input) },
            TupleExpr::Order { input, keys } => TupleExpr::Order {
                input: map(input),
                keys: keys.clone(),
            },
            TupleExpr::Slice {
                input,
                offset,
                limit,
            } => TupleExpr::Slice {
                input: map(input),
                offset: *offset,
                limit: *limit,
            },
        }
    }

    /// Value expressions held directly by this node.
    pub fn value_exprs(&self) -> Vec<&ValueExpr> {
        match self {
            TupleExpr::Filter { condition, .. } => vec![condition],
            TupleExpr::Extension { elements, .. } => elements.iter().map(|e| &e.expr).collect(),
            TupleExpr::LeftJoin { condition, .. } => condition.iter().collect(),
            TupleExpr::Group { elements, .. } => elements
                .iter()
                .filter_map(|e| e.aggregate.arg.as_ref())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Visit every value expression in the tree, including nested ones.
    pub fn walk_value_exprs<'a>(&'a self, f: &mut impl FnMut(&'a ValueExpr)) {
        for expr in self.value_exprs() {
            expr.walk(f);
        }
        for child in self.children() {
            child.walk_value_exprs(f);
        }
    }

    /// Check whether any value expression in the tree matches a predicate.
    pub fn any_value_expr(&self, mut pred: impl FnMut(&ValueExpr) -> bool) -> bool {
        let mut found = false;
        self.walk_value_exprs(&mut |e| found |= pred(e));
        found
    }

    /// Count the group elements anywhere in the tree.
    pub fn group_elem_count(&self) -> usize {
        let own = match self {
            TupleExpr::Group { elements, .. } => elements.len(),
            _ => 0,
        };
        own + self
            .children()
            .iter()
            .map(|c| c.group_elem_count())
            .sum::<usize>()
    }

    /// Variables this expression may bind in its output (context aside).
    pub fn binding_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_binding_names(&mut names);
        names
    }

    fn collect_binding_names(&self, names: &mut BTreeSet<String>) {
        match self {
            TupleExpr::SingletonSet | TupleExpr::EmptySet => {}
            TupleExpr::StatementPattern {
                subject,
                predicate,
                object,
            } => {
                for term in [subject, predicate, object] {
                    if let TermPattern::Var(name) = term {
                        names.insert(name.clone());
                    }
                }
            }
            TupleExpr::Values { rows } => {
                for row in rows {
                    names.extend(row.names().map(str::to_string));
                }
            }
            TupleExpr::Extension { input, elements } => {
                input.collect_binding_names(names);
                names.extend(elements.iter().map(|e| e.name.clone()));
            }
            TupleExpr::Projection { names: projected, .. } => {
                names.extend(projected.iter().cloned());
            }
            TupleExpr::Group {
                group_by, elements, ..
            } => {
                names.extend(group_by.iter().cloned());
                names.extend(elements.iter().map(|e| e.name.clone()));
            }
            other => {
                for child in other.children() {
                    child.collect_binding_names(names);
                }
            }
        }
    }
}

impl fmt::Display for TupleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format_indent(f, 0)
    }
}

impl TupleExpr {
    fn format_indent(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            TupleExpr::SingletonSet => writeln!(f, "{}SingletonSet", pad),
            TupleExpr::EmptySet => writeln!(f, "{}EmptySet", pad),
            TupleExpr::StatementPattern {
                subject,
                predicate,
                object,
            } => writeln!(f, "{}StatementPattern: {} {} {}", pad, subject, predicate, object),
            TupleExpr::Values { rows } => {
                let rows: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
                writeln!(f, "{}Values: [{}]", pad, rows.join(", "))
            }
            TupleExpr::Filter { input, condition } => {
                writeln!(f, "{}Filter: {}", pad, condition)?;
                input.format_indent(f, indent + 1)
            }
            TupleExpr::Extension { input, elements } => {
                let elems: Vec<String> = elements
                    .iter()
                    .map(|e| format!("{} AS ?{}", e.expr, e.name))
                    .collect();
                writeln!(f, "{}Extension: [{}]", pad, elems.join(", "))?;
                input.format_indent(f, indent + 1)
            }
            TupleExpr::Projection { input, names } => {
                writeln!(f, "{}Projection: [{}]", pad, names.join(", "))?;
                input.format_indent(f, indent + 1)
            }
            TupleExpr::Join { left, right } => {
                writeln!(f, "{}Join", pad)?;
                left.format_indent(f, indent + 1)?;
                right.format_indent(f, indent + 1)
            }
            TupleExpr::LeftJoin {
                left,
                right,
                condition,
            } => {
                write!(f, "{}LeftJoin", pad)?;
                if let Some(cond) = condition {
                    write!(f, ": {}", cond)?;
                }
                writeln!(f)?;
                left.format_indent(f, indent + 1)?;
                right.format_indent(f, indent + 1)
            }
            TupleExpr::Union { left, right } => {
                writeln!(f, "{}Union", pad)?;
                left.format_indent(f, indent + 1)?;
                right.format_indent(f, indent + 1)
            }
            TupleExpr::Group {
                input,
                group_by,
                elements,
            } => {
                let aggs: Vec<String> = elements
                    .iter()
                    .map(|e| format!("{} AS ?{}", e.aggregate, e.name))
                    .collect();
                writeln!(
                    f,
                    "{}Group: by=[{}], aggs=[{}]",
                    pad,
                    group_by.join(", "),
                    aggs.join(", ")
                )?;
                input.format_indent(f, indent + 1)
            }
            TupleExpr::Distinct { input } => {
                writeln!(f, "{}Distinct", pad)?;
                input.format_indent(f, indent + 1)
            }
            TupleExpr::Order { input, keys } => {
                let keys: Vec<String> = keys
                    .iter()
                    .map(|k| format!("{} {}", k.name, if k.ascending { "ASC" } else { "DESC" }))
                    .collect();
                writeln!(f, "{}Order: [{}]", pad, keys.join(", "))?;
                input.format_indent(f, indent + 1)
            }
            TupleExpr::Slice {
                input,
                offset,
                limit,
            } => {
                write!(f, "{}Slice: offset={}", pad, offset)?;
                if let Some(l) = limit {
                    write!(f, " limit={}", l)?;
                }
                writeln!(f)?;
                input.format_indent(f, indent + 1)
            }
        }
    }
}
