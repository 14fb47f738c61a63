use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

/// An implementation of `TaskMapper` to map a `WorkflowTask` of type `TaskType::Simple` to a
/// `TaskModel` with status `TaskStatus::Scheduled`, to be polled by a worker from the queue
/// named after the task.
pub struct SimpleTaskMapper;

impl TaskMapper for SimpleTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Simple
    }

    /// return a List with just one simple task
    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in SimpleTaskMapper",
            task_mapper_context
        );

        let workflow_task = task_mapper_context.workflow_task;
        let task_def = match task_mapper_context.task_definition()? {
            Some(task_def) => task_def,
            None => {
                return fmt_err!(
                    TerminateWorkflow,
                    "Invalid task. Task {} does not have a definition",
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

        let mut simple_task = task_mapper_context.create_task_model(TaskStatus::Scheduled);
        simple_task.task_type = workflow_task.name.clone();
        simple_task.start_delay_in_seconds = workflow_task.start_delay;
        simple_task.input_data = input;
        simple_task.retry_count = task_mapper_context.retry_count;
        simple_task.callback_after_seconds = workflow_task.start_delay as i64;
        simple_task.response_timeout_seconds = task_def.get_response_timeout_seconds() as i64;
        simple_task.retried_task_id = task_mapper_context.retry_task_id.clone();
        simple_task.rate_limit_per_frequency = task_def.rate_limit_per_frequency();
        simple_task.rate_limit_frequency_in_seconds = task_def.rate_limit_frequency_in_seconds();
        simple_task.isolation_group_id = task_def.isolation_group_id.clone();
        simple_task.execution_name_space = task_def.execution_name_space.clone();

        Ok(vec![simple_task])
    }
}
