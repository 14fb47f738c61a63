use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};

pub struct ExclusiveJoinTaskMapper;

impl TaskMapper for ExclusiveJoinTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::ExclusiveJoin
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in ExclusiveJoinTaskMapper",
            task_mapper_context
        );

        let workflow_task = task_mapper_context.workflow_task;

        let mut join_input = object_map! {
            "joinOn" => workflow_task
                .join_on
                .iter()
                .map(Object::from)
                .collect::<Vec<_>>(),
        };
        if !workflow_task.default_exclusive_join_task.is_empty() {
            join_input.insert(
                "defaultExclusiveJoinTask".into(),
                workflow_task
                    .default_exclusive_join_task
                    .iter()
                    .map(Object::from)
                    .collect::<Vec<_>>()
                    .into(),
            );
        }

        let mut join_task = task_mapper_context.create_task_model(TaskStatus::InProgress);
        join_task.task_type = TaskType::ExclusiveJoin.as_ref().into();
        join_task.task_def_name = TaskType::ExclusiveJoin.as_ref().into();
        join_task.start_time = Utc::now().timestamp_millis();
        join_task.input_data = join_input;

        Ok(vec![join_task])
    }
}
