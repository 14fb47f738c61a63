use regor_common::prelude::*;
use regor_common::TaskType;

use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::WorkflowExecutor;

/// Copies the task input into the workflow variables.
pub struct SetVariable {
    max_threshold_kb: usize,
}

impl SetVariable {
    pub fn new(max_threshold_kb: usize) -> Self {
        Self { max_threshold_kb }
    }

    fn validate_variables_size(&self, workflow: &WorkflowModel) -> Option<String> {
        let payload_size = Object::json_size(&workflow.variables);
        if payload_size > self.max_threshold_kb * 1024 {
            let error_msg = format!(
                "The variables payload size: {} of workflow: {} is greater than the permissible limit: {} bytes",
                payload_size,
                workflow.workflow_id,
                self.max_threshold_kb * 1024
            );
            error!("{}", error_msg);
            Some(error_msg)
        } else {
            None
        }
    }
}

impl WorkflowSystemTask for SetVariable {
    fn task_type(&self) -> &str {
        TaskType::SetVariable.as_ref()
    }

    fn execute(
        &self,
        workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        if !task.input_data.is_empty() {
            let mut new_keys = Vec::default();
            let mut previous_values: HashMap<InlineStr, Object> = HashMap::default();

            for (k, v) in &task.input_data {
                match workflow.variables.insert(k.clone(), v.clone()) {
                    Some(previous) => {
                        previous_values.entry(k.clone()).or_insert(previous);
                    }
                    None => new_keys.push(k.clone()),
                }
                debug!("Task: {} setting value for variable: {}", task.task_id, k);
            }

            if let Some(error_msg) = self.validate_variables_size(workflow) {
                // restore previous variables
                workflow.variables.extend(previous_values);
                for k in new_keys {
                    workflow.variables.remove(&k);
                }
                task.set_failed(TaskStatus::FailedWithTerminalError, error_msg);
                return Ok(true);
            }
        }

        task.set_status(TaskStatus::Completed);
        Ok(true)
    }
}
