//! Optimizer pipeline.
//!
//! Runs a sequence of rewrite rules over an algebra tree until the tree stops
//! changing or the iteration cap is reached.

use std::sync::Arc;

use tracing::debug;

use super::constant::ConstantOptimizer;
use super::filter::FilterSimplifier;
use crate::algebra::{BindingSet, TupleExpr};
use crate::config::OptimizerConfig;
use crate::evaluation::EvaluationStrategy;

/// A rewrite of an algebra tree that preserves its results under any
/// superset of the given bindings.
pub trait QueryOptimizer: Send + Sync {
    /// Name of the rule.
    fn name(&self) -> &str;

    /// Rewrite a tree. Rules never fail; a rule that cannot improve a tree
    /// returns it unchanged.
    fn optimize(&self, expr: &TupleExpr, bindings: &BindingSet) -> TupleExpr;
}

/// The query optimizer.
pub struct Optimizer {
    rules: Vec<Box<dyn QueryOptimizer>>,
    max_iterations: usize,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    /// Create an optimizer with no rules.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            max_iterations: 10,
        }
    }

    /// Create an optimizer with the rules enabled in the configuration.
    pub fn from_config(config: &OptimizerConfig, strategy: Arc<dyn EvaluationStrategy>) -> Self {
        let mut optimizer = Self::new().with_max_iterations(config.max_iterations);
        if config.constant_folding {
            optimizer.add_rule(Box::new(ConstantOptimizer::new(strategy)));
        }
        if config.simplify_filters {
            optimizer.add_rule(Box::new(FilterSimplifier));
        }
        optimizer
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Add a custom optimization rule.
    pub fn add_rule(&mut self, rule: Box<dyn QueryOptimizer>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Optimize an algebra tree.
    pub fn optimize(&self, expr: TupleExpr, bindings: &BindingSet) -> TupleExpr {
        let mut current = expr;

        for iteration in 0..self.max_iterations {
            let mut next = current.clone();
            for rule in &self.rules {
                next = rule.optimize(&next, bindings);
            }

            if next == current {
                debug!("optimizer reached a fixpoint after {} iteration(s)", iteration + 1);
                break;
            }

            current = next;
        }

        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{CompareOp, ExtensionElem, ValueExpr};
    use crate::evaluation::StrictEvaluationStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn strategy() -> Arc<dyn EvaluationStrategy> {
        Arc::new(StrictEvaluationStrategy::empty())
    }

    struct CountingRule(Arc<AtomicUsize>);

    impl QueryOptimizer for CountingRule {
        fn name(&self) -> &str {
            "Counting"
        }

        fn optimize(&self, expr: &TupleExpr, _bindings: &BindingSet) -> TupleExpr {
            self.0.fetch_add(1, Ordering::SeqCst);
            expr.clone()
        }
    }

    #[test]
    fn test_optimizer_runs_rules() {
        let tree = TupleExpr::filter(
            TupleExpr::SingletonSet,
            ValueExpr::compare(ValueExpr::var("x"), CompareOp::Eq, ValueExpr::lit(1i64)),
        );
        let optimizer = Optimizer::from_config(&OptimizerConfig::default(), strategy());
        let result = optimizer.optimize(tree, &BindingSet::new().with("x", 1i64));
        assert_eq!(result, TupleExpr::SingletonSet);
    }

    #[test]
    fn test_config_disables_rules() {
        let config = OptimizerConfig {
            constant_folding: false,
            ..OptimizerConfig::default()
        };
        let optimizer = Optimizer::from_config(&config, strategy());
        assert_eq!(optimizer.rule_names(), vec!["FilterSimplification"]);

        let tree = TupleExpr::extension(
            TupleExpr::SingletonSet,
            vec![ExtensionElem::new("y", ValueExpr::var("x"))],
        );
        let result = optimizer.optimize(tree.clone(), &BindingSet::new().with("x", 1i64));
        assert_eq!(result, tree);
    }

    #[test]
    fn test_stops_at_fixpoint() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut optimizer = Optimizer::new();
        optimizer.add_rule(Box::new(CountingRule(calls.clone())));
        let result = optimizer.optimize(TupleExpr::SingletonSet, &BindingSet::new());
        assert_eq!(result, TupleExpr::SingletonSet);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
