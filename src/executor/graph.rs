//! Read-only plan graphs for diagnostics.
//!
//! Nodes are keyed by plan node id. Data edges run from child to parent,
//! sink edges from an operator to the sink it discards into.

use std::fmt::Write;

use serde::Serialize;

use super::node::PlanNodeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// Nodes and labeled edges of a plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl PlanGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. A node already present keeps its first label.
    pub fn add_node(&mut self, id: PlanNodeId, label: impl Into<String>) {
        let id = id.to_string();
        if self.nodes.iter().any(|n| n.id == id) {
            return;
        }
        self.nodes.push(GraphNode {
            id,
            label: label.into(),
        });
    }

    pub fn add_edge(&mut self, from: PlanNodeId, to: PlanNodeId, label: &str) {
        self.edges.push(GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            label: label.to_string(),
        });
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn contains(&self, id: PlanNodeId) -> bool {
        let id = id.to_string();
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Render as a Graphviz digraph.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph plan {\n");
        for node in &self.nodes {
            let _ = writeln!(out, "  \"{}\" [label=\"{}\"];", node.id, escape(&node.label));
        }
        for edge in &self.edges {
            let _ = writeln!(
                out,
                "  \"{}\" -> \"{}\" [label=\"{}\"];",
                edge.from,
                edge.to,
                escape(&edge.label)
            );
        }
        out.push_str("}\n");
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::executor::{BufferedSink, DiscardSink, JoinKind, PlanNode, TupleCondition};
    use crate::tuple;

    #[test]
    fn test_add_node_keeps_first_label() {
        let mut graph = PlanGraph::new();
        let id = PlanNodeId::new();
        graph.add_node(id, "first");
        graph.add_node(id, "second");
        assert_eq!(graph.nodes().len(), 1);
        assert_eq!(graph.nodes()[0].label, "first");
        assert!(graph.contains(id));
    }

    #[test]
    fn test_join_graph_with_sinks() {
        let left_sink = Arc::new(BufferedSink::new());
        let right_sink = Arc::new(BufferedSink::new());
        let left = PlanNode::values(vec![tuple![1i64]]);
        let right = PlanNode::values(vec![tuple![2i64]]);
        let (left_id, right_id) = (left.id(), right.id());
        let discarded_left: Arc<dyn DiscardSink> = left_sink.clone();
        let discarded_right: Arc<dyn DiscardSink> = right_sink.clone();
        let plan = PlanNode::join_with_sinks(
            JoinKind::Inner,
            left,
            right,
            Some(discarded_left),
            Some(discarded_right),
        );

        let graph = plan.to_graph();
        assert_eq!(graph.nodes().len(), 5);
        let edge = |from: PlanNodeId, to: PlanNodeId, label: &str| GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            label: label.to_string(),
        };
        assert!(graph.edges().contains(&edge(left_id, plan.id(), "left")));
        assert!(graph.edges().contains(&edge(right_id, plan.id(), "right")));
        assert!(graph.edges().contains(&edge(plan.id(), left_sink.id(), "discardedLeft")));
        assert!(graph.edges().contains(&edge(plan.id(), right_sink.id(), "discardedRight")));
        assert_eq!(left_sink.parents(), vec![plan.id()]);
    }

    #[test]
    fn test_sink_reused_as_leaf_appears_once() {
        let sink = Arc::new(BufferedSink::new());
        let filtered = PlanNode::filter_with_sink(
            PlanNode::values(vec![]),
            TupleCondition::Bound(0),
            sink.clone(),
        );
        let plan = PlanNode::union(filtered, PlanNode::buffered(sink.clone()));
        let graph = plan.to_graph();
        let sink_id = sink.id().to_string();
        assert_eq!(graph.nodes().iter().filter(|n| n.id == sink_id).count(), 1);
        assert_eq!(graph.edges().len(), 4);
    }

    #[test]
    fn test_dot_escapes_labels() {
        let mut graph = PlanGraph::new();
        let (a, b) = (PlanNodeId::new(), PlanNodeId::new());
        graph.add_node(a, "Filter: $0 = \"x\"");
        graph.add_node(b, "Values");
        graph.add_edge(b, a, "input");
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph plan {\n"));
        assert!(dot.contains("[label=\"Filter: $0 = \\\"x\\\"\"]"));
        assert!(dot.contains(&format!("\"{}\" -> \"{}\" [label=\"input\"];", b, a)));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_json_export() {
        let plan = PlanNode::unique(PlanNode::values(vec![]));
        let json: serde_json::Value = serde_json::from_str(&plan.to_graph().to_json().unwrap()).unwrap();
        assert_eq!(json["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(json["edges"][0]["label"], "input");
        assert_eq!(json["nodes"][0]["label"], "Unique");
    }
}
