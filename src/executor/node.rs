//! Physical plan nodes.
//!
//! A [`PlanNode`] is an immutable operator tree. Opening a node returns a
//! fresh [`TupleIter`](super::TupleIter) with private cursors, so a node can
//! be opened any number of times, including concurrently.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;
use ulid::Ulid;

use super::error::{ExecuteError, ExecuteResult};
use super::graph::PlanGraph;
use super::iteration::{BoxedIter, Iteration, TupleList};
use super::join::{JoinKind, JoinOp};
use super::operators::{FilterOp, LimitOp, ProjectOp, SortOp, UnionOp, UniqueOp};
use super::sink::{BufferedSink, DiscardSink};
use super::source::OrderedSource;
use crate::algebra::CompareOp;
use crate::config::ExecutionConfig;
use crate::evaluation::{compare_values, EvalError};
use crate::tuple::{Tuple, Value};

/// Stable identifier of a plan node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanNodeId(Ulid);

impl PlanNodeId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PlanNodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string().to_lowercase())
    }
}

/// What kind of data a node produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputShape {
    /// Tuples read from statements.
    Statements,
    /// Tuples produced by aggregation.
    Aggregated,
}

impl fmt::Display for OutputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputShape::Statements => write!(f, "statements"),
            OutputShape::Aggregated => write!(f, "aggregated"),
        }
    }
}

/// A per-tuple filter condition over slot positions.
#[derive(Debug, Clone, PartialEq)]
pub enum TupleCondition {
    /// The slot holds a value.
    Bound(usize),
    /// The slot value compared with a constant.
    Compare { slot: usize, op: CompareOp, value: Value },
    Not(Box<TupleCondition>),
    And(Box<TupleCondition>, Box<TupleCondition>),
    Or(Box<TupleCondition>, Box<TupleCondition>),
}

impl TupleCondition {
    pub fn compare(slot: usize, op: CompareOp, value: impl Into<Value>) -> Self {
        TupleCondition::Compare {
            slot,
            op,
            value: value.into(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: TupleCondition) -> Self {
        TupleCondition::Not(Box::new(inner))
    }

    pub fn and(left: TupleCondition, right: TupleCondition) -> Self {
        TupleCondition::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: TupleCondition, right: TupleCondition) -> Self {
        TupleCondition::Or(Box::new(left), Box::new(right))
    }

    /// Evaluate against a tuple. Comparing an unbound slot is an error.
    pub fn evaluate(&self, tuple: &Tuple) -> ExecuteResult<bool> {
        match self {
            TupleCondition::Bound(slot) => Ok(tuple.get(*slot).is_some()),
            TupleCondition::Compare { slot, op, value } => {
                let actual = tuple
                    .get(*slot)
                    .ok_or_else(|| EvalError::UnboundVariable(format!("${}", slot)))?;
                Ok(compare_values(actual, *op, value)?)
            }
            TupleCondition::Not(inner) => Ok(!inner.evaluate(tuple)?),
            TupleCondition::And(l, r) => Ok(l.evaluate(tuple)? && r.evaluate(tuple)?),
            TupleCondition::Or(l, r) => Ok(l.evaluate(tuple)? || r.evaluate(tuple)?),
        }
    }
}

impl fmt::Display for TupleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TupleCondition::Bound(slot) => write!(f, "BOUND(${})", slot),
            TupleCondition::Compare { slot, op, value } => write!(f, "${} {} {}", slot, op, value),
            TupleCondition::Not(inner) => write!(f, "!({})", inner),
            TupleCondition::And(l, r) => write!(f, "({} && {})", l, r),
            TupleCondition::Or(l, r) => write!(f, "({} || {})", l, r),
        }
    }
}

/// Physical operators.
pub enum PlanOperator {
    /// Scan an ordered source.
    Scan { source: Arc<dyn OrderedSource> },

    /// Constant tuples, replayed in the given order.
    Values { tuples: Vec<Tuple>, shape: OutputShape },

    /// Keep tuples satisfying the condition; route the rest to the sink.
    Filter {
        input: Box<PlanNode>,
        condition: TupleCondition,
        discarded: Option<Arc<dyn DiscardSink>>,
    },

    /// Keep the listed slots, in order.
    Project { input: Box<PlanNode>, slots: Vec<usize> },

    /// Materialize and sort by the tuple order.
    Sort { input: Box<PlanNode>, buffer_limit: usize },

    /// Skip `offset` tuples, then stop after `limit`.
    Limit {
        input: Box<PlanNode>,
        offset: usize,
        limit: Option<usize>,
    },

    /// Merge two sorted inputs, keeping duplicates.
    Union { left: Box<PlanNode>, right: Box<PlanNode> },

    /// Drop consecutive duplicates from a sorted input.
    Unique { input: Box<PlanNode> },

    /// Sort-merge join on slot 0.
    Join {
        kind: JoinKind,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        discarded_left: Option<Arc<dyn DiscardSink>>,
        discarded_right: Option<Arc<dyn DiscardSink>>,
    },

    /// Replay the tuples a buffered sink holds when opened.
    Buffered { sink: Arc<BufferedSink>, shape: OutputShape },
}

/// A node in a physical plan.
pub struct PlanNode {
    id: PlanNodeId,
    operator: PlanOperator,
}

impl PlanNode {
    fn new(operator: PlanOperator) -> Self {
        Self {
            id: PlanNodeId::new(),
            operator,
        }
    }

    pub fn scan(source: Arc<dyn OrderedSource>) -> Self {
        Self::new(PlanOperator::Scan { source })
    }

    pub fn values(tuples: Vec<Tuple>) -> Self {
        Self::values_with_shape(tuples, OutputShape::Statements)
    }

    pub fn values_with_shape(tuples: Vec<Tuple>, shape: OutputShape) -> Self {
        Self::new(PlanOperator::Values { tuples, shape })
    }

    pub fn filter(input: PlanNode, condition: TupleCondition) -> Self {
        Self::new(PlanOperator::Filter {
            input: Box::new(input),
            condition,
            discarded: None,
        })
    }

    /// A filter that pushes rejected tuples to `sink`.
    pub fn filter_with_sink(
        input: PlanNode,
        condition: TupleCondition,
        sink: Arc<dyn DiscardSink>,
    ) -> Self {
        let node = Self::new(PlanOperator::Filter {
            input: Box::new(input),
            condition,
            discarded: Some(sink.clone()),
        });
        sink.receive_parents(vec![node.id]);
        node
    }

    pub fn project(input: PlanNode, slots: Vec<usize>) -> Self {
        Self::new(PlanOperator::Project {
            input: Box::new(input),
            slots,
        })
    }

    /// A sort with the default buffer limit.
    pub fn sort(input: PlanNode) -> Self {
        Self::sort_with_limit(input, ExecutionConfig::default().sort_buffer_limit)
    }

    pub fn sort_with_limit(input: PlanNode, buffer_limit: usize) -> Self {
        Self::new(PlanOperator::Sort {
            input: Box::new(input),
            buffer_limit,
        })
    }

    pub fn limit(input: PlanNode, offset: usize, limit: Option<usize>) -> Self {
        Self::new(PlanOperator::Limit {
            input: Box::new(input),
            offset,
            limit,
        })
    }

    pub fn union(left: PlanNode, right: PlanNode) -> Self {
        Self::new(PlanOperator::Union {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unique(input: PlanNode) -> Self {
        Self::new(PlanOperator::Unique {
            input: Box::new(input),
        })
    }

    /// Inner join without sinks.
    pub fn join(left: PlanNode, right: PlanNode) -> Self {
        Self::join_with_sinks(JoinKind::Inner, left, right, None, None)
    }

    pub fn left_outer_join(left: PlanNode, right: PlanNode) -> Self {
        Self::join_with_sinks(JoinKind::LeftOuter, left, right, None, None)
    }

    pub fn anti_join(left: PlanNode, right: PlanNode) -> Self {
        Self::join_with_sinks(JoinKind::Anti, left, right, None, None)
    }

    /// A join of any kind with optional discard sinks for each side.
    pub fn join_with_sinks(
        kind: JoinKind,
        left: PlanNode,
        right: PlanNode,
        discarded_left: Option<Arc<dyn DiscardSink>>,
        discarded_right: Option<Arc<dyn DiscardSink>>,
    ) -> Self {
        let node = Self::new(PlanOperator::Join {
            kind,
            left: Box::new(left),
            right: Box::new(right),
            discarded_left: discarded_left.clone(),
            discarded_right: discarded_right.clone(),
        });
        for sink in discarded_left.iter().chain(discarded_right.iter()) {
            sink.receive_parents(vec![node.id]);
        }
        node
    }

    /// A leaf replaying the sink's buffer. Shares the sink's id.
    pub fn buffered(sink: Arc<BufferedSink>) -> Self {
        Self::buffered_with_shape(sink, OutputShape::Statements)
    }

    pub fn buffered_with_shape(sink: Arc<BufferedSink>, shape: OutputShape) -> Self {
        Self {
            id: sink.id(),
            operator: PlanOperator::Buffered { sink, shape },
        }
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn operator(&self) -> &PlanOperator {
        &self.operator
    }

    /// Children with the edge label used in plan graphs.
    pub fn children(&self) -> Vec<(&'static str, &PlanNode)> {
        match &self.operator {
            PlanOperator::Scan { .. }
            | PlanOperator::Values { .. }
            | PlanOperator::Buffered { .. } => Vec::new(),
            PlanOperator::Filter { input, .. }
            | PlanOperator::Project { input, .. }
            | PlanOperator::Sort { input, .. }
            | PlanOperator::Limit { input, .. }
            | PlanOperator::Unique { input } => vec![("input", input.as_ref())],
            PlanOperator::Union { left, right } | PlanOperator::Join { left, right, .. } => {
                vec![("left", left.as_ref()), ("right", right.as_ref())]
            }
        }
    }

    /// Attached discard sinks with their edge labels.
    pub fn sinks(&self) -> Vec<(&'static str, &Arc<dyn DiscardSink>)> {
        match &self.operator {
            PlanOperator::Filter {
                discarded: Some(sink),
                ..
            } => vec![("discarded", sink)],
            PlanOperator::Join {
                discarded_left,
                discarded_right,
                ..
            } => {
                let mut sinks = Vec::new();
                if let Some(sink) = discarded_left {
                    sinks.push(("discardedLeft", sink));
                }
                if let Some(sink) = discarded_right {
                    sinks.push(("discardedRight", sink));
                }
                sinks
            }
            _ => Vec::new(),
        }
    }

    /// Leaves have depth 0; every other node is one deeper than its deepest
    /// child.
    pub fn depth(&self) -> usize {
        self.children()
            .iter()
            .map(|(_, child)| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// The shape of this node's output. Binary nodes require both children to
    /// agree.
    pub fn output_shape(&self) -> ExecuteResult<OutputShape> {
        match &self.operator {
            PlanOperator::Scan { source } => Ok(source.shape()),
            PlanOperator::Values { shape, .. } | PlanOperator::Buffered { shape, .. } => Ok(*shape),
            PlanOperator::Filter { input, .. }
            | PlanOperator::Project { input, .. }
            | PlanOperator::Sort { input, .. }
            | PlanOperator::Limit { input, .. }
            | PlanOperator::Unique { input } => input.output_shape(),
            PlanOperator::Union { left, right } | PlanOperator::Join { left, right, .. } => {
                let (left, right) = (left.output_shape()?, right.output_shape()?);
                if left != right {
                    return Err(ExecuteError::ShapeMismatch { left, right });
                }
                Ok(left)
            }
        }
    }

    /// Short description used in plan graphs and `Display`.
    pub fn label(&self) -> String {
        match &self.operator {
            PlanOperator::Scan { source } => format!("Scan: {}", source.label()),
            PlanOperator::Values { tuples, .. } => format!("Values: {} tuple(s)", tuples.len()),
            PlanOperator::Filter { condition, .. } => format!("Filter: {}", condition),
            PlanOperator::Project { slots, .. } => {
                let slots: Vec<String> = slots.iter().map(|s| format!("${}", s)).collect();
                format!("Project: [{}]", slots.join(", "))
            }
            PlanOperator::Sort { .. } => "Sort".to_string(),
            PlanOperator::Limit { offset, limit, .. } => match limit {
                Some(limit) => format!("Limit: offset={} limit={}", offset, limit),
                None => format!("Limit: offset={}", offset),
            },
            PlanOperator::Union { .. } => "Union".to_string(),
            PlanOperator::Unique { .. } => "Unique".to_string(),
            PlanOperator::Join { kind, .. } => kind.to_string(),
            PlanOperator::Buffered { sink, .. } => sink.label(),
        }
    }

    /// Add this node, its subtree and its sinks to a plan graph.
    ///
    /// Data edges point from child to parent; sink edges point from the
    /// operator to the sink.
    pub fn describe(&self, graph: &mut PlanGraph) {
        graph.add_node(self.id, self.label());
        for (label, child) in self.children() {
            child.describe(graph);
            graph.add_edge(child.id, self.id, label);
        }
        for (label, sink) in self.sinks() {
            if let Some(sink_id) = sink.node_id() {
                graph.add_node(sink_id, sink.label());
                graph.add_edge(self.id, sink_id, label);
            }
        }
    }

    /// The plan graph rooted at this node.
    pub fn to_graph(&self) -> PlanGraph {
        let mut graph = PlanGraph::new();
        self.describe(&mut graph);
        graph
    }

    /// Open a fresh iteration over this node.
    pub fn open(&self) -> ExecuteResult<BoxedIter<'_>> {
        let iter = match &self.operator {
            PlanOperator::Scan { source } => source.scan()?,

            PlanOperator::Values { tuples, .. } => {
                Iteration::boxed("values", TupleList::new(tuples.clone()))
            }

            PlanOperator::Buffered { sink, .. } => {
                Iteration::boxed("buffered", TupleList::new(sink.tuples()))
            }

            PlanOperator::Filter {
                input,
                condition,
                discarded,
            } => Iteration::boxed("filter", FilterOp::new(input.open()?, condition, discarded.as_ref())),

            PlanOperator::Project { input, slots } => {
                Iteration::boxed("project", ProjectOp::new(input.open()?, slots))
            }

            PlanOperator::Sort {
                input,
                buffer_limit,
            } => Iteration::boxed("sort", SortOp::new(input.open()?, *buffer_limit)),

            PlanOperator::Limit {
                input,
                offset,
                limit,
            } => Iteration::boxed("limit", LimitOp::new(input.open()?, *offset, *limit)),

            PlanOperator::Union { left, right } => {
                let (left, right) = open_pair(left, right)?;
                Iteration::boxed("union", UnionOp::new(left, right))
            }

            PlanOperator::Unique { input } => Iteration::boxed("unique", UniqueOp::new(input.open()?)),

            PlanOperator::Join {
                kind,
                left,
                right,
                discarded_left,
                discarded_right,
            } => {
                let (left, right) = open_pair(left, right)?;
                Iteration::boxed(
                    kind.name(),
                    JoinOp::new(*kind, left, right, discarded_left.as_ref(), discarded_right.as_ref()),
                )
            }
        };
        Ok(iter)
    }

    /// Open, drain and close, returning every tuple.
    pub fn collect(&self) -> ExecuteResult<Vec<Tuple>> {
        let mut iter = self.open()?;
        let mut tuples = Vec::new();
        for tuple in iter.by_ref() {
            tuples.push(tuple?);
        }
        iter.close()?;
        Ok(tuples)
    }
}

/// Open both children. If the right one fails to open, the left one is
/// closed before the open error is returned.
fn open_pair<'a>(left: &'a PlanNode, right: &'a PlanNode) -> ExecuteResult<(BoxedIter<'a>, BoxedIter<'a>)> {
    let mut left = left.open()?;
    match right.open() {
        Ok(right) => Ok((left, right)),
        Err(e) => {
            if let Err(close) = left.close() {
                warn!("failed to close left child after open error {}: {}", e, close);
            }
            Err(e)
        }
    }
}

impl fmt::Debug for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanNode")
            .field("id", &self.id)
            .field("label", &self.label())
            .finish()
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format_indent(f, 0)
    }
}

impl PlanNode {
    fn format_indent(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(f, "{}{}", "  ".repeat(indent), self.label())?;
        for (_, child) in self.children() {
            child.format_indent(f, indent + 1)?;
        }
        Ok(())
    }
}
