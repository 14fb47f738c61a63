use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

/// An implementation of `TaskMapper` to map a `WorkflowTask` of type `TaskType::Http` to a
/// `TaskModel` of type `TaskType::Http` with `TaskStatus::Scheduled`, polled from the `HTTP`
/// queue by an external worker.
pub struct HttpTaskMapper;

impl TaskMapper for HttpTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Http
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in HttpTaskMapper",
            task_mapper_context
        );

        let workflow_task = task_mapper_context.workflow_task;
        let mut input_parameters = workflow_task.input_parameters.clone();
        input_parameters.insert("asyncComplete".into(), workflow_task.async_complete.into());

        let task_def = task_mapper_context.task_definition()?;
        let input = ParametersUtils::get_task_input(
            &input_parameters,
            task_mapper_context.workflow_model,
            task_def.as_ref(),
            Some(&task_mapper_context.task_id),
        )?;

        let mut http_task = task_mapper_context.create_task_model(TaskStatus::Scheduled);
        http_task.input_data = input;
        http_task.retry_count = task_mapper_context.retry_count;
        http_task.retried_task_id = task_mapper_context.retry_task_id.clone();
        http_task.callback_after_seconds = workflow_task.start_delay as i64;
        if let Some(task_def) = task_def {
            http_task.rate_limit_per_frequency = task_def.rate_limit_per_frequency();
            http_task.rate_limit_frequency_in_seconds = task_def.rate_limit_frequency_in_seconds();
            http_task.response_timeout_seconds = task_def.get_response_timeout_seconds() as i64;
            http_task.isolation_group_id = task_def.isolation_group_id;
            http_task.execution_name_space = task_def.execution_name_space;
        }
        Ok(vec![http_task])
    }
}
