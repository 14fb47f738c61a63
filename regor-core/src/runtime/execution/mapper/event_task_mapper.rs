use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

pub struct EventTaskMapper;

impl TaskMapper for EventTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Event
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in EventTaskMapper",
            task_mapper_context
        );

        let workflow_task = task_mapper_context.workflow_task;
        let mut input_parameters = workflow_task.input_parameters.clone();
        input_parameters.insert("sink".into(), (&workflow_task.sink).into());
        input_parameters.insert("asyncComplete".into(), workflow_task.async_complete.into());

        let event_task_input = ParametersUtils::get_task_input(
            &input_parameters,
            task_mapper_context.workflow_model,
            None,
            Some(&task_mapper_context.task_id),
        )?;

        let mut event_task = task_mapper_context.create_task_model(TaskStatus::Scheduled);
        event_task.task_type = TaskType::Event.as_ref().into();
        event_task.input_data = event_task_input;
        Ok(vec![event_task])
    }
}
