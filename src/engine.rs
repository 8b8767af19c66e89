//! Query engine facade.
//!
//! Ties the configuration, the evaluation strategy and the optimizer
//! pipeline together.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::algebra::{BindingSet, TupleExpr};
use crate::config::{ConfigError, EngineConfig};
use crate::evaluation::{EvalError, EvaluationStrategy, StrictEvaluationStrategy};
use crate::executor::{ExecuteError, PlanNode};
use crate::optimizer::Optimizer;
use crate::tuple::Tuple;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("execution error: {0}")]
    Execute(#[from] ExecuteError),

    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvalError),
}

/// The main engine handle.
pub struct QueryEngine {
    config: EngineConfig,
    strategy: Arc<dyn EvaluationStrategy>,
    optimizer: Optimizer,
}

impl QueryEngine {
    /// Create an engine. The optimizer folds through the same strategy that
    /// evaluates.
    pub fn new(config: EngineConfig, strategy: Arc<dyn EvaluationStrategy>) -> EngineResult<Self> {
        config.validate()?;
        let optimizer = Optimizer::from_config(&config.optimizer, strategy.clone());
        debug!("query engine ready with rules {:?}", optimizer.rule_names());
        Ok(Self {
            config,
            strategy,
            optimizer,
        })
    }

    /// An engine with default configuration over an empty triple source.
    pub fn with_defaults() -> EngineResult<Self> {
        Self::new(EngineConfig::default(), Arc::new(StrictEvaluationStrategy::empty()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategy(&self) -> &Arc<dyn EvaluationStrategy> {
        &self.strategy
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    /// Optimize a tree for evaluation under `bindings` or any superset.
    pub fn prepare(&self, tree: &TupleExpr, bindings: &BindingSet) -> TupleExpr {
        self.optimizer.optimize(tree.clone(), bindings)
    }

    /// Optimize, then evaluate through the strategy.
    pub fn evaluate(&self, tree: &TupleExpr, bindings: &BindingSet) -> EngineResult<Vec<BindingSet>> {
        let prepared = self.prepare(tree, bindings);
        Ok(self.strategy.evaluate(&prepared, bindings)?)
    }

    /// A sort node bounded by the configured buffer limit.
    pub fn sort_node(&self, input: PlanNode) -> PlanNode {
        PlanNode::sort_with_limit(input, self.config.execution.sort_buffer_limit)
    }

    /// Check the plan's shape, then run it to completion.
    pub fn execute(&self, plan: &PlanNode) -> EngineResult<Vec<Tuple>> {
        plan.output_shape()?;
        debug!("executing plan of depth {}", plan.depth());
        Ok(plan.collect()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{CompareOp, ExtensionElem, ValueExpr};
    use crate::evaluation::MemoryTripleSource;
    use crate::executor::OutputShape;
    use crate::tuple;
    use crate::tuple::Value;

    fn x_equals_one() -> TupleExpr {
        TupleExpr::filter(
            TupleExpr::SingletonSet,
            ValueExpr::compare(ValueExpr::var("x"), CompareOp::Eq, ValueExpr::lit(1i64)),
        )
    }

    #[test]
    fn test_prepare_folds_bound_filter() {
        let engine = QueryEngine::with_defaults().unwrap();
        let bindings = BindingSet::new().with("x", 1i64);
        assert_eq!(engine.prepare(&x_equals_one(), &bindings), TupleExpr::SingletonSet);
        assert_eq!(engine.optimizer().rule_names(), vec!["ConstantFolding", "FilterSimplification"]);
    }

    #[test]
    fn test_prepare_without_folding() {
        let config = EngineConfig::new().constant_folding(false);
        let engine = QueryEngine::new(config, Arc::new(StrictEvaluationStrategy::empty())).unwrap();
        let bindings = BindingSet::new().with("x", 1i64);
        assert_eq!(engine.prepare(&x_equals_one(), &bindings), x_equals_one());
    }

    #[test]
    fn test_evaluate_matches_unoptimized() {
        let source = MemoryTripleSource::new();
        source.add("a", "p", 1i64);
        let strategy: Arc<dyn EvaluationStrategy> = Arc::new(StrictEvaluationStrategy::new(Arc::new(source)));
        let engine = QueryEngine::new(EngineConfig::default(), strategy.clone()).unwrap();
        let tree = TupleExpr::extension(
            x_equals_one(),
            vec![ExtensionElem::new(
                "y",
                ValueExpr::call("CONCAT", vec![ValueExpr::lit("a"), ValueExpr::lit("b")]),
            )],
        );
        let bindings = BindingSet::new().with("x", 1i64);
        let rows = engine.evaluate(&tree, &bindings).unwrap();
        assert_eq!(rows, strategy.evaluate(&tree, &bindings).unwrap());
        assert_eq!(rows[0].get("y"), Some(&Value::string("ab")));
    }

    #[test]
    fn test_evaluation_error_surfaces() {
        let engine = QueryEngine::with_defaults().unwrap();
        let err = engine.evaluate(&x_equals_one(), &BindingSet::new()).unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(EvalError::UnboundVariable(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::new().max_iterations(0);
        let result = QueryEngine::new(config, Arc::new(StrictEvaluationStrategy::empty()));
        assert!(matches!(result, Err(EngineError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_execute_uses_configured_sort_limit() {
        let config = EngineConfig::new().sort_buffer_limit(2);
        let engine = QueryEngine::new(config, Arc::new(StrictEvaluationStrategy::empty())).unwrap();
        let small = engine.sort_node(PlanNode::values(vec![tuple![2i64], tuple![1i64]]));
        assert_eq!(engine.execute(&small).unwrap(), vec![tuple![1i64], tuple![2i64]]);
        let large = engine.sort_node(PlanNode::values(vec![tuple![3i64], tuple![2i64], tuple![1i64]]));
        assert!(matches!(
            engine.execute(&large),
            Err(EngineError::Execute(ExecuteError::ResourceLimit(_)))
        ));
    }

    #[test]
    fn test_execute_rejects_shape_mismatch() {
        let engine = QueryEngine::with_defaults().unwrap();
        let plan = PlanNode::union(
            PlanNode::values(vec![tuple![1i64]]),
            PlanNode::values_with_shape(vec![], OutputShape::Aggregated),
        );
        assert!(matches!(
            engine.execute(&plan),
            Err(EngineError::Execute(ExecuteError::ShapeMismatch { .. }))
        ));
    }
}
