use dashmap::DashMap;
use regor_common::prelude::*;

use super::{Evaluator, JavascriptEvaluator, RhaiEvaluator, ValueParamEvaluator};

/// The evaluators available to SWITCH, DO_WHILE and INLINE tasks, by evaluator type.
pub struct EvaluatorRegistry {
    evaluators: DashMap<InlineStr, Arc<dyn Evaluator>>,
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        let rhai = Arc::new(RhaiEvaluator::new());
        let javascript: Arc<dyn Evaluator> = Arc::new(JavascriptEvaluator::new(rhai.clone()));

        let evaluators: DashMap<InlineStr, Arc<dyn Evaluator>> = DashMap::new();
        evaluators.insert(ValueParamEvaluator::NAME.into(), Arc::new(ValueParamEvaluator));
        evaluators.insert(JavascriptEvaluator::NAME.into(), javascript.clone());
        evaluators.insert(JavascriptEvaluator::GRAALJS_NAME.into(), javascript);
        evaluators.insert(RhaiEvaluator::NAME.into(), rhai);
        Self { evaluators }
    }

    pub fn register(&self, evaluator_type: &str, evaluator: Arc<dyn Evaluator>) {
        self.evaluators.insert(evaluator_type.into(), evaluator);
    }

    pub fn get_evaluator(&self, evaluator_type: &str) -> Option<Arc<dyn Evaluator>> {
        self.evaluators.get(evaluator_type).map(|x| x.value().clone())
    }
}
