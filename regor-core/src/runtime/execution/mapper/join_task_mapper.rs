use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};

/// An implementation of `TaskMapper` to map a `WorkflowTask` of type `TaskType::Join` to a
/// `TaskModel` of type `TaskType::Join`, in progress until the tasks of `joinOn` are done.
pub struct JoinTaskMapper;

impl TaskMapper for JoinTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Join
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in JoinTaskMapper",
            task_mapper_context
        );

        let join_on = task_mapper_context
            .workflow_task
            .join_on
            .iter()
            .map(Object::from)
            .collect::<Vec<_>>();

        let mut join_task = task_mapper_context.create_task_model(TaskStatus::InProgress);
        join_task.task_type = TaskType::Join.as_ref().into();
        join_task.task_def_name = TaskType::Join.as_ref().into();
        join_task.start_time = Utc::now().timestamp_millis();
        join_task.input_data = object_map! { "joinOn" => join_on };

        Ok(vec![join_task])
    }
}
