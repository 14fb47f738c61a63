use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

/// An implementation of `TaskMapper` to map a `WorkflowTask` of a type no other mapper knows to a
/// `TaskModel` of that type with `TaskStatus::Scheduled`. It is queued under its type and run by
/// a worker or a registered system task.
pub struct UserDefinedTaskMapper;

impl TaskMapper for UserDefinedTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::UserDefined
    }

    /// return a List with just one User defined task
    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in UserDefinedTaskMapper",
            task_mapper_context
        );

        let workflow_task = task_mapper_context.workflow_task;
        let task_def = match task_mapper_context.task_definition()? {
            Some(task_def) => task_def,
            None => {
                return fmt_err!(
                    TerminateWorkflow,
                    "Invalid task specified. Cannot find task by name {} in the task definitions",
                    workflow_task.name
                )
            }
        };

        let input = ParametersUtils::get_task_input(
            &workflow_task.input_parameters,
            task_mapper_context.workflow_model,
            Some(&task_def),
            Some(&task_mapper_context.task_id),
        )?;

        let mut user_defined_task = task_mapper_context.create_task_model(TaskStatus::Scheduled);
        user_defined_task.input_data = input;
        user_defined_task.retry_count = task_mapper_context.retry_count;
        user_defined_task.retried_task_id = task_mapper_context.retry_task_id.clone();
        user_defined_task.callback_after_seconds = workflow_task.start_delay as i64;
        user_defined_task.response_timeout_seconds = task_def.get_response_timeout_seconds() as i64;
        user_defined_task.rate_limit_per_frequency = task_def.rate_limit_per_frequency();
        user_defined_task.rate_limit_frequency_in_seconds =
            task_def.rate_limit_frequency_in_seconds();
        Ok(vec![user_defined_task])
    }
}
