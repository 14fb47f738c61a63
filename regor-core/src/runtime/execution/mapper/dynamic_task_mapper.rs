use regor_common::prelude::*;
use regor_common::{TaskDef, TaskType, WorkflowTask};

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

/// An implementation of `TaskMapper` to map a `WorkflowTask` of type `TaskType::Dynamic` to a
/// `TaskModel` based on definition derived from the dynamic task name defined in
/// `WorkflowTask::input_parameters`
pub struct DynamicTaskMapper;

impl TaskMapper for DynamicTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Dynamic
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in DynamicTaskMapper",
            task_mapper_context
        );

        let task_name = Self::get_dynamic_task_name(
            &task_mapper_context.task_input,
            &task_mapper_context.workflow_task.dynamic_task_name_param,
        )?;

        // the resolved task stands in for the dynamic one on the scheduled model
        let mut workflow_task = task_mapper_context.workflow_task.clone();
        workflow_task.name = task_name.clone();
        let task_def = Self::get_dynamic_task_definition(&task_mapper_context, &workflow_task)?;
        workflow_task.task_definition = Some(task_def.clone());

        let input = ParametersUtils::get_task_input(
            &workflow_task.input_parameters,
            task_mapper_context.workflow_model,
            Some(&task_def),
            Some(&task_mapper_context.task_id),
        )?;

        let mut dynamic_task = task_mapper_context.create_task_model(TaskStatus::Scheduled);
        dynamic_task.start_delay_in_seconds = workflow_task.start_delay;
        dynamic_task.input_data = input;
        dynamic_task.retry_count = task_mapper_context.retry_count;
        dynamic_task.callback_after_seconds = workflow_task.start_delay as i64;
        dynamic_task.response_timeout_seconds = task_def.get_response_timeout_seconds() as i64;
        dynamic_task.task_type = task_name.clone();
        dynamic_task.task_def_name = task_name;
        dynamic_task.retried_task_id = task_mapper_context.retry_task_id.clone();
        dynamic_task.rate_limit_per_frequency = task_def.rate_limit_per_frequency();
        dynamic_task.rate_limit_frequency_in_seconds = task_def.rate_limit_frequency_in_seconds();
        dynamic_task.workflow_task = Some(workflow_task);
        Ok(vec![dynamic_task])
    }
}

impl DynamicTaskMapper {
    /// Helper method that looks into the input params and returns the dynamic task name
    fn get_dynamic_task_name(
        task_input: &HashMap<InlineStr, Object>,
        task_name_param: &str,
    ) -> RegorResult<InlineStr> {
        task_input
            .get(task_name_param)
            .and_then(|x| x.as_string().ok())
            .filter(|x| !x.is_empty())
            .cloned()
            .ok_or_else(|| {
                ErrorCode::TerminateWorkflow(format!(
                    "Cannot map a dynamic task based on the parameter and input. Parameter= {}, input= {:?}",
                    task_name_param, task_input
                ))
            })
    }

    /// This method gets the TaskDefinition for a specific `WorkflowTask`
    fn get_dynamic_task_definition(
        task_mapper_context: &TaskMapperContext,
        workflow_task: &WorkflowTask,
    ) -> RegorResult<TaskDef> {
        if let Some(task_def) = task_mapper_context.decider.get_task_def(&workflow_task.name)? {
            return Ok(task_def);
        }
        fmt_err!(
            TerminateWorkflow,
            "Invalid task specified. Cannot find task by name {} in the task definitions",
            workflow_task.name
        )
    }
}
