use regor_common::prelude::*;
use regor_common::TaskType;

use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::evaluators::{EvaluatorRegistry, JavascriptEvaluator};
use crate::runtime::execution::WorkflowExecutor;

/// Runs the `scriptExpression` of the workflow task against the task input, `$` being the input.
///
/// Superseded by INLINE, which can pick its evaluator.
pub struct Lambda {
    evaluators: Arc<EvaluatorRegistry>,
}

impl Lambda {
    const QUERY_EXPRESSION_PARAMETER: &'static str = "scriptExpression";

    pub fn new(evaluators: Arc<EvaluatorRegistry>) -> Self {
        Self { evaluators }
    }
}

impl WorkflowSystemTask for Lambda {
    fn task_type(&self) -> &str {
        TaskType::Lambda.as_ref()
    }

    fn execute(
        &self,
        _workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        let script_expression = match task
            .input_data
            .get(Self::QUERY_EXPRESSION_PARAMETER)
            .and_then(|x| x.as_string().ok())
            .cloned()
        {
            Some(script_expression) if !script_expression.trim().is_empty() => script_expression,
            _ => {
                error!("Empty {} in Lambda task. ", Self::QUERY_EXPRESSION_PARAMETER);
                task.set_failed(
                    TaskStatus::FailedWithTerminalError,
                    "Empty 'scriptExpression' in Lambda task's input parameters. A non-empty String value must be provided.",
                );
                return Ok(true);
            }
        };

        let evaluator = self
            .evaluators
            .get_evaluator(JavascriptEvaluator::NAME)
            .ok_or_else(|| ErrorCode::NotFound("javascript evaluator is not registered"))?;
        let input = Object::Map(task.input_data.clone());
        match evaluator.evaluate(&script_expression, &input) {
            Ok(result) => {
                trace!(
                    "Lambda task {} result: {:?}, workflow: {}",
                    task.task_id,
                    result,
                    task.workflow_instance_id
                );
                task.add_output("result", result);
                task.set_status(TaskStatus::Completed);
            }
            Err(e) => {
                error!(
                    "Failed to execute Lambda Task: {} in workflow: {}, {}",
                    task.task_id, task.workflow_instance_id, e
                );
                task.set_failed(TaskStatus::Failed, e.display_text());
                task.add_output("error", e.display_text());
            }
        }
        Ok(true)
    }
}
