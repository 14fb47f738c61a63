use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};

/// An implementation of `TaskMapper` to map a `WorkflowTask` of type `TaskType::ForkJoin` to a
/// List of `TaskModel`: a completed `TaskType::Fork`, the first task of every branch and the
/// `TaskType::Join` that must follow the fork.
pub struct ForkJoinTaskMapper;

impl TaskMapper for ForkJoinTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::ForkJoin
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in ForkJoinTaskMapper",
            task_mapper_context
        );

        let workflow_task = task_mapper_context.workflow_task;
        let workflow_model = task_mapper_context.workflow_model;
        let decider = task_mapper_context.decider;
        let retry_count = task_mapper_context.retry_count;

        let mut tasks_to_be_scheduled = Vec::default();
        let mut fork_task = task_mapper_context.create_task_model(TaskStatus::Completed);
        fork_task.task_type = TaskType::Fork.as_ref().into();
        fork_task.task_def_name = TaskType::Fork.as_ref().into();
        let epoch_millis = Utc::now().timestamp_millis();
        fork_task.start_time = epoch_millis;
        fork_task.end_time = epoch_millis;
        fork_task.input_data = task_mapper_context.task_input.clone();
        tasks_to_be_scheduled.push(fork_task);

        for branch in &workflow_task.fork_tasks {
            if let Some(first_task) = branch.first() {
                tasks_to_be_scheduled.extend(decider.get_tasks_to_be_scheduled(
                    workflow_model,
                    first_task,
                    retry_count,
                )?);
            }
        }

        let join_workflow_task = match workflow_model
            .workflow_definition
            .get_next_task(&workflow_task.task_reference_name)
        {
            Some(join) if join.task_type() == TaskType::Join => join,
            _ => {
                return str_err!(
                    TerminateWorkflow,
                    "Fork task definition is not followed by a join task. Check the blueprint"
                )
            }
        };

        tasks_to_be_scheduled.extend(decider.get_tasks_to_be_scheduled(
            workflow_model,
            join_workflow_task,
            retry_count,
        )?);
        Ok(tasks_to_be_scheduled)
    }
}
