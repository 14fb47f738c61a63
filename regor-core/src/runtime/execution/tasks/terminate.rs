use regor_common::prelude::*;
use regor_common::TaskType;

use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel, WorkflowStatus};
use crate::runtime::execution::WorkflowExecutor;

/// Task that can terminate a workflow with a given status and modify the workflow's output with a
/// given parameter, it can act as a "return" statement for conditions where you simply want to
/// terminate your workflow.
///
/// The workflow itself is finished by the executor once the decider sees this task completed.
pub struct Terminate;

impl WorkflowSystemTask for Terminate {
    fn task_type(&self) -> &str {
        TaskType::Terminate.as_ref()
    }

    fn execute(
        &self,
        _workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        let return_status = task
            .input_data
            .get(Self::TERMINATION_STATUS_PARAMETER)
            .and_then(|x| x.as_string().ok());

        if Self::validate_input_status(return_status) {
            task.output_data = Self::get_input_from_param(&task.input_data);
            task.set_status(TaskStatus::Completed);
        } else {
            task.set_failed(TaskStatus::Failed, "given termination status is not valid");
        }
        Ok(true)
    }
}

impl Terminate {
    pub const TERMINATION_STATUS_PARAMETER: &'static str = "terminationStatus";
    pub const TERMINATION_REASON_PARAMETER: &'static str = "terminationReason";
    const TERMINATION_WORKFLOW_OUTPUT: &'static str = "workflowOutput";

    fn validate_input_status(status: Option<&InlineStr>) -> bool {
        status
            .map(|x| {
                x.eq(WorkflowStatus::Completed.as_ref()) || x.eq(WorkflowStatus::Failed.as_ref())
            })
            .unwrap_or(false)
    }

    fn get_input_from_param(task_input: &HashMap<InlineStr, Object>) -> HashMap<InlineStr, Object> {
        let mut output = HashMap::default();
        match task_input.get(Self::TERMINATION_WORKFLOW_OUTPUT) {
            Some(Object::Map(map)) => output.extend(map.iter().map(|(k, v)| (k.clone(), v.clone()))),
            Some(input) => {
                output.insert("output".into(), input.clone());
            }
            None => {}
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use regor_common::prelude::*;

    use super::Terminate;

    #[test]
    fn non_map_output_is_wrapped() {
        let input = object_map! {"workflowOutput" => "done"};
        let output = Terminate::get_input_from_param(&input);
        assert_eq!(output.get("output"), Some(&Object::from("done")));

        let input = object_map! {"workflowOutput" => object_map! {"a" => 1}};
        let output = Terminate::get_input_from_param(&input);
        assert_eq!(output.get("a"), Some(&Object::Int(1)));
    }

    #[test]
    fn only_completed_or_failed_is_valid() {
        assert!(Terminate::validate_input_status(Some(&"FAILED".into())));
        assert!(Terminate::validate_input_status(Some(&"COMPLETED".into())));
        assert!(!Terminate::validate_input_status(Some(&"TERMINATED".into())));
        assert!(!Terminate::validate_input_status(None));
    }
}
