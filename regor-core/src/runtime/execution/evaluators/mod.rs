mod evaluator;
mod evaluator_registry;
mod javascript_evaluator;
mod rhai_evaluator;
mod value_param_evaluator;

pub use evaluator::Evaluator;
pub use evaluator_registry::EvaluatorRegistry;
pub use javascript_evaluator::JavascriptEvaluator;
pub use rhai_evaluator::RhaiEvaluator;
pub use value_param_evaluator::ValueParamEvaluator;
