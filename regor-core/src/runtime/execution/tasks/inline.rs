use regor_common::prelude::*;
use regor_common::TaskType;

use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::evaluators::EvaluatorRegistry;
use crate::runtime::execution::WorkflowExecutor;

/// Evaluates `expression` with the evaluator named by `evaluatorType`, the task input bound as
/// `$`, and stores the value under `result`.
pub struct Inline {
    evaluators: Arc<EvaluatorRegistry>,
}

impl Inline {
    const QUERY_EVALUATOR_TYPE: &'static str = "evaluatorType";
    const QUERY_EXPRESSION_PARAMETER: &'static str = "expression";

    pub fn new(evaluators: Arc<EvaluatorRegistry>) -> Self {
        Self { evaluators }
    }

    fn input_str(task: &TaskModel, key: &str) -> Option<InlineStr> {
        task.input_data
            .get(key)
            .and_then(|x| x.as_string().ok())
            .filter(|x| !x.trim().is_empty())
            .cloned()
    }

    fn check_evaluator_and_expression(
        &self,
        task: &TaskModel,
    ) -> Result<(InlineStr, InlineStr), String> {
        let mut errors = Vec::new();
        let evaluator_type = Self::input_str(task, Self::QUERY_EVALUATOR_TYPE);
        match &evaluator_type {
            None => errors.push(format!(
                "Empty '{}' in INLINE task's input parameters. A non-empty String value must be provided.",
                Self::QUERY_EVALUATOR_TYPE
            )),
            Some(x) if self.evaluators.get_evaluator(x).is_none() => errors.push(format!(
                "Evaluator '{}' is not supported for INLINE task",
                x
            )),
            _ => {}
        }
        let expression = Self::input_str(task, Self::QUERY_EXPRESSION_PARAMETER);
        if expression.is_none() {
            errors.push(format!(
                "Empty '{}' in INLINE task's input parameters. A non-empty String value must be provided.",
                Self::QUERY_EXPRESSION_PARAMETER
            ));
        }

        match (evaluator_type, expression) {
            (Some(evaluator_type), Some(expression)) if errors.is_empty() => {
                Ok((evaluator_type, expression))
            }
            _ => Err(errors.join(" ")),
        }
    }
}

impl WorkflowSystemTask for Inline {
    fn task_type(&self) -> &str {
        TaskType::Inline.as_ref()
    }

    fn execute(
        &self,
        _workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        let (evaluator_type, expression) = match self.check_evaluator_and_expression(task) {
            Ok(x) => x,
            Err(reason) => {
                error!("{}", reason);
                task.set_failed(TaskStatus::FailedWithTerminalError, reason);
                return Ok(true);
            }
        };

        let evaluator = self
            .evaluators
            .get_evaluator(&evaluator_type)
            .ok_or_else(|| ErrorCode::NotFound(format!("evaluator {} not found", evaluator_type)))?;
        let input = Object::Map(task.input_data.clone());
        match evaluator.evaluate(&expression, &input) {
            Ok(result) => {
                task.add_output("result", result);
                task.set_status(TaskStatus::Completed);
            }
            Err(e) => {
                error!(
                    "Failed to execute Inline Task: {} in workflow: {}, {}",
                    task.task_id, task.workflow_instance_id, e
                );
                task.set_failed(TaskStatus::Failed, e.display_text());
                task.add_output("error", e.display_text());
            }
        }
        Ok(true)
    }
}
