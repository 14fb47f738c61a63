use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

/// Maps a `TaskType::Lambda`, run right away by the decider: the task evaluates the
/// `scriptExpression` of its workflow task against the resolved input.
pub struct LambdaTaskMapper;

impl TaskMapper for LambdaTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Lambda
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in LambdaTaskMapper",
            task_mapper_context
        );

        let task_def = task_mapper_context.task_definition()?;
        let task_input = ParametersUtils::get_task_input(
            &task_mapper_context.workflow_task.input_parameters,
            task_mapper_context.workflow_model,
            task_def.as_ref(),
            Some(&task_mapper_context.task_id),
        )?;

        let mut lambda_task = task_mapper_context.create_task_model(TaskStatus::InProgress);
        lambda_task.task_type = TaskType::Lambda.as_ref().into();
        lambda_task.start_time = Utc::now().timestamp_millis();
        lambda_task.input_data = task_input;

        Ok(vec![lambda_task])
    }
}
