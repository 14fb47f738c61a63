use regor_common::prelude::*;
use regor_common::{TaskType, WorkflowDef};

use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel, WorkflowStatus};
use crate::runtime::execution::WorkflowExecutor;
use crate::runtime::StartWorkflowInput;

/// Starts a child workflow and mirrors its status onto this task.
pub struct SubWorkflow;

impl SubWorkflow {
    const SUB_WORKFLOW_ID: &'static str = "subWorkflowId";

    fn build_start_input(workflow: &WorkflowModel, task: &TaskModel) -> RegorResult<StartWorkflowInput> {
        let input = &task.input_data;
        let name = input
            .get("subWorkflowName")
            .map(|x| x.to_string())
            .unwrap_or_default();
        let version = match input.get("subWorkflowVersion").filter(|x| !x.is_null()) {
            Some(version) => Some(version.as_i64()? as i32),
            None => None,
        };
        let workflow_definition = match input.get("subWorkflowDefinition") {
            Some(definition @ Object::Map(_)) => Some(WorkflowDef::try_from(&definition.to_json())?),
            _ => None,
        };
        let task_to_domain = match input.get("subWorkflowTaskToDomain") {
            Some(Object::Map(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
            _ => workflow.task_to_domain.clone(),
        };
        let workflow_input = input
            .get("workflowInput")
            .and_then(|x| x.as_map())
            .cloned()
            .unwrap_or_default();

        let mut start_input = StartWorkflowInput::new(name, workflow_input)
            .with_parent(&workflow.workflow_id, &task.task_id);
        start_input.version = version;
        start_input.workflow_definition = workflow_definition;
        start_input.task_to_domain = task_to_domain;
        start_input.correlation_id = workflow.correlation_id.clone();
        start_input.priority = Some(workflow.priority);
        Ok(start_input)
    }

    /// Mirrors the status of the child workflow, returns true once the task is terminal.
    pub(crate) fn update_task_status(sub_workflow: &WorkflowModel, task: &mut TaskModel) -> bool {
        let status = match sub_workflow.status {
            WorkflowStatus::Running | WorkflowStatus::Paused => {
                task.set_status(TaskStatus::InProgress);
                return false;
            }
            WorkflowStatus::Completed => TaskStatus::Completed,
            WorkflowStatus::Failed => TaskStatus::Failed,
            WorkflowStatus::Terminated => TaskStatus::Canceled,
            WorkflowStatus::TimedOut => TaskStatus::TimedOut,
        };
        task.set_status(status);
        task.output_data = sub_workflow.output.clone();
        task.add_output(Self::SUB_WORKFLOW_ID, &sub_workflow.workflow_id);
        if !status.is_successful() {
            task.reason_for_incompletion = format!(
                "Sub workflow {} failure reason: {}",
                sub_workflow.to_short_string(),
                sub_workflow.reason_for_incompletion
            )
            .into();
        }
        true
    }
}

impl WorkflowSystemTask for SubWorkflow {
    fn task_type(&self) -> &str {
        TaskType::SubWorkflow.as_ref()
    }

    fn start(
        &self,
        workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        let start_input = Self::build_start_input(workflow, task)?;
        let sub_workflow_id = match executor.start_workflow(start_input) {
            Ok(sub_workflow_id) => sub_workflow_id,
            Err(e) if e.is_transient() => {
                warn!(
                    "A transient error occurred while starting sub workflow for task: {}, {}",
                    task.task_id, e
                );
                return Ok(());
            }
            Err(e) => {
                error!(
                    "Error starting sub workflow for task: {} of workflow: {}, {}",
                    task.task_id, workflow.workflow_id, e
                );
                task.set_failed(TaskStatus::Failed, e.display_text());
                return Ok(());
            }
        };

        task.sub_workflow_id = sub_workflow_id.clone();
        task.add_output(Self::SUB_WORKFLOW_ID, sub_workflow_id.clone());
        task.set_status(TaskStatus::InProgress);

        // the child may already be terminal once its first decide is done
        let sub_workflow = executor.get_workflow(&sub_workflow_id, false)?;
        Self::update_task_status(&sub_workflow, task);
        Ok(())
    }

    fn execute(
        &self,
        _workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        if task.sub_workflow_id.is_empty() {
            return Ok(false);
        }
        let sub_workflow = executor.get_workflow(&task.sub_workflow_id, false)?;
        Ok(Self::update_task_status(&sub_workflow, task))
    }

    fn cancel(
        &self,
        workflow: &WorkflowModel,
        task: &mut TaskModel,
        executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        if task.sub_workflow_id.is_empty() {
            return Ok(());
        }
        let sub_workflow = executor.get_workflow(&task.sub_workflow_id, false)?;
        if sub_workflow.status.is_terminal() {
            return Ok(());
        }
        let reason = if workflow.reason_for_incompletion.is_empty() {
            format!("Parent workflow has been {}", workflow.status.as_ref())
        } else {
            workflow.reason_for_incompletion.to_string()
        };
        executor.terminate_workflow(&task.sub_workflow_id, &reason)
    }

    fn is_async(&self) -> bool {
        true
    }
}
