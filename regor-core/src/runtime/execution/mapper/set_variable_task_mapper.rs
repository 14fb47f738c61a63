use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};

pub struct SetVariableTaskMapper;

impl TaskMapper for SetVariableTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::SetVariable
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in SetVariableTaskMapper",
            task_mapper_context
        );

        let mut var_task = task_mapper_context.create_task_model(TaskStatus::InProgress);
        var_task.task_type = TaskType::SetVariable.as_ref().into();
        var_task.start_time = Utc::now().timestamp_millis();
        var_task.input_data = task_mapper_context.task_input.clone();

        Ok(vec![var_task])
    }
}
