use regor_common::prelude::*;

pub trait Evaluator: Send + Sync {
    /// Evaluate the expression using the inputs provided, if required. Evaluation of the expression
    /// depends on the type of the evaluator.
    ///
    /// An invalid expression is a `ScriptEvalFailed` error, never a transient one.
    fn evaluate(&self, expression: &str, input: &Object) -> RegorResult<Object>;
}
