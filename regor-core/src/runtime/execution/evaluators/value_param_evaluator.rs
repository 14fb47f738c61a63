use regor_common::prelude::*;

use super::Evaluator;

/// The value of the input parameter named by the expression.
pub struct ValueParamEvaluator;

impl ValueParamEvaluator {
    pub const NAME: &'static str = "value-param";
}

impl Evaluator for ValueParamEvaluator {
    fn evaluate(&self, expression: &str, input: &Object) -> RegorResult<Object> {
        debug!(
            "ValueParam evaluator -- evaluating: {} with input: {:?}",
            expression, input
        );
        if let Object::Map(input) = input {
            let result = input.get(expression).cloned().unwrap_or(Object::Null);
            debug!("ValueParam evaluator -- result is: {:?}", result);
            Ok(result)
        } else {
            error!("Input has to be a Map object: {:?}", input);
            fmt_err!(
                ScriptEvalFailed,
                "Input has to be a Map object: {:?}",
                input
            )
        }
    }
}
