use regor_common::prelude::*;
use regor_common::{SubWorkflowParams, TaskType, WorkflowTask};

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

/// Maps a `TaskType::SubWorkflow` to a scheduled task carrying the resolved name, version,
/// task to domain mapping and input of the workflow to start.
pub struct SubWorkflowTaskMapper;

impl TaskMapper for SubWorkflowTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::SubWorkflow
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in SubWorkflowTaskMapper",
            task_mapper_context
        );

        let workflow_task = task_mapper_context.workflow_task;
        // Check if there are sub workflow parameters, if not throw an exception, cannot initiate a
        // sub-workflow without workflow params
        let sub_workflow_params = Self::get_sub_workflow_params(workflow_task)?;
        let resolved_params = Self::get_sub_workflow_input_parameters(
            &task_mapper_context,
            sub_workflow_params,
        )?;

        let sub_workflow_name = resolved_params
            .get("name")
            .map(|x| x.to_string())
            .unwrap_or_default();
        let sub_workflow_version =
            Self::get_sub_workflow_version(&task_mapper_context, &resolved_params, &sub_workflow_name)?;

        let mut sub_workflow_task = task_mapper_context.create_task_model(TaskStatus::Scheduled);
        sub_workflow_task.task_type = TaskType::SubWorkflow.as_ref().into();
        sub_workflow_task.add_input("subWorkflowName", sub_workflow_name);
        sub_workflow_task.add_input("subWorkflowVersion", sub_workflow_version);
        if let Some(task_to_domain @ Object::Map(_)) = resolved_params.get("taskToDomain") {
            sub_workflow_task.add_input("subWorkflowTaskToDomain", task_to_domain.clone());
        }
        if let Some(definition) = resolved_params.get("workflowDefinition") {
            sub_workflow_task.add_input("subWorkflowDefinition", definition.clone());
        }
        sub_workflow_task.add_input(
            "workflowInput",
            task_mapper_context.task_input.clone(),
        );
        sub_workflow_task.retry_count = task_mapper_context.retry_count;
        sub_workflow_task.retried_task_id = task_mapper_context.retry_task_id.clone();
        sub_workflow_task.callback_after_seconds = workflow_task.start_delay as i64;

        debug!(
            "SubWorkflowTask {} created to be Scheduled",
            sub_workflow_task.task_id
        );
        Ok(vec![sub_workflow_task])
    }
}

impl SubWorkflowTaskMapper {
    fn get_sub_workflow_params(workflow_task: &WorkflowTask) -> RegorResult<&SubWorkflowParams> {
        workflow_task.sub_workflow_param.as_ref().ok_or_else(|| {
            let reason = format!(
                "Task {} is defined as sub-workflow and is missing subWorkflowParams. Please check the workflow definition",
                workflow_task.name
            );
            error!("{}", reason);
            ErrorCode::TerminateWorkflow(reason)
        })
    }

    fn get_sub_workflow_input_parameters(
        task_mapper_context: &TaskMapperContext,
        sub_workflow_params: &SubWorkflowParams,
    ) -> RegorResult<HashMap<InlineStr, Object>> {
        let mut params = object_map! { "name" => &sub_workflow_params.name };
        if let Some(version) = sub_workflow_params.version {
            params.insert("version".into(), version.into());
        }
        if !sub_workflow_params.task_to_domain.is_empty() {
            let task_to_domain = sub_workflow_params
                .task_to_domain
                .iter()
                .map(|(k, v)| (k.clone(), Object::from(v)))
                .collect::<HashMap<_, _>>();
            params.insert("taskToDomain".into(), task_to_domain.into());
        }

        let mut params =
            ParametersUtils::replace_with_workflow(&params, task_mapper_context.workflow_model);

        // do not resolve params inside subworkflow definition
        if let Some(definition) = &sub_workflow_params.workflow_definition {
            params.insert(
                "workflowDefinition".into(),
                Object::from_json(&definition.to_json()?),
            );
        }
        Ok(params)
    }

    fn get_sub_workflow_version(
        task_mapper_context: &TaskMapperContext,
        resolved_params: &HashMap<InlineStr, Object>,
        sub_workflow_name: &str,
    ) -> RegorResult<i32> {
        if let Some(version) = resolved_params.get("version").filter(|x| !x.is_null()) {
            return Ok(version.as_i64()? as i32);
        }
        if let Some(Object::Map(definition)) = resolved_params.get("workflowDefinition") {
            if let Some(version) = definition.get("version") {
                return Ok(version.as_i64()? as i32);
            }
        }

        match task_mapper_context
            .decider
            .get_latest_workflow_def(sub_workflow_name)?
        {
            Some(latest_workflow_def) => Ok(latest_workflow_def.version),
            None => {
                let reason = format!(
                    "The Task {} defined as a sub-workflow has no workflow definition available",
                    sub_workflow_name
                );
                error!("{}", reason);
                str_err!(TerminateWorkflow, reason)
            }
        }
    }
}
