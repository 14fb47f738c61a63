use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

/// An implementation of `TaskMapper` to map a `WorkflowTask` of type `TaskType::DoWhile` to a
/// `TaskModel` of type `TaskType::DoWhile`
pub struct DoWhileTaskMapper;

impl TaskMapper for DoWhileTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::DoWhile
    }

    /// This method maps `TaskMapper` to map a `WorkflowTask` of type `TaskType::DoWhile` to a
    /// `TaskModel` of type `TaskType::DoWhile` with a status of `TaskStatus::InProgress`. The
    /// same task lives through every iteration: once it is terminal nothing is mapped again.
    ///
    /// return: A `TaskModel` of type `TaskType::DoWhile` in a List
    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in DoWhileTaskMapper",
            task_mapper_context
        );

        let workflow_task = task_mapper_context.workflow_task;
        let workflow_model = task_mapper_context.workflow_model;

        if let Some(task) =
            workflow_model.get_task_by_ref_name(&workflow_task.task_reference_name)?
        {
            if task.status.is_terminal() {
                // Since loopTask is already completed no need to schedule task again.
                return Ok(vec![]);
            }
        }

        let task_def = task_mapper_context.task_definition()?;

        let mut do_while_task = task_mapper_context.create_task_model(TaskStatus::InProgress);
        do_while_task.task_type = TaskType::DoWhile.as_ref().into();
        do_while_task.start_time = Utc::now().timestamp_millis();
        if let Some(task_def) = &task_def {
            do_while_task.rate_limit_per_frequency = task_def.rate_limit_per_frequency();
            do_while_task.rate_limit_frequency_in_seconds =
                task_def.rate_limit_frequency_in_seconds();
        }
        do_while_task.retry_count = task_mapper_context.retry_count;

        do_while_task.input_data = ParametersUtils::get_task_input(
            &workflow_task.input_parameters,
            workflow_model,
            task_def.as_ref(),
            Some(&do_while_task.task_id),
        )?;

        Ok(vec![do_while_task])
    }
}
