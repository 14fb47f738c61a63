use regor_common::prelude::*;
use regor_common::{StartWorkflowRequest, TaskType};

use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::WorkflowExecutor;
use crate::runtime::StartWorkflowInput;

/// The START_WORKFLOW task starts another workflow. Unlike SUB_WORKFLOW, START_WORKFLOW does not
/// create a relationship between starter and the started workflow. It also does not wait for the
/// started workflow to complete. A START_WORKFLOW is considered successful once the requested
/// workflow is started successfully. There is no ability to access the output of the started
/// workflow.
pub struct StartWorkflow;

impl StartWorkflow {
    const WORKFLOW_ID: &'static str = "workflowId";
    const START_WORKFLOW_PARAMETER: &'static str = "startWorkflow";

    fn get_request(task: &TaskModel) -> RegorResult<StartWorkflowRequest> {
        match task.input_data.get(Self::START_WORKFLOW_PARAMETER) {
            Some(request) => StartWorkflowRequest::try_from(request),
            None => fmt_err!(
                IllegalArgument,
                "Missing '{}' in input data.",
                Self::START_WORKFLOW_PARAMETER
            ),
        }
    }
}

impl WorkflowSystemTask for StartWorkflow {
    fn task_type(&self) -> &str {
        TaskType::StartWorkflow.as_ref()
    }

    fn start(
        &self,
        workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        let request = match Self::get_request(task) {
            Ok(request) => request,
            Err(e) => {
                error!("Error reading StartWorkflowRequest for {}, {}", task.task_id, e);
                task.set_failed(TaskStatus::Failed, e.display_text());
                return Ok(());
            }
        };

        let mut start_input = StartWorkflowInput::from(request);
        if start_input.task_to_domain.is_empty() {
            start_input.task_to_domain = workflow.task_to_domain.clone();
        }
        if start_input.correlation_id.is_empty() {
            start_input.correlation_id = workflow.correlation_id.clone();
        }
        start_input.triggering_workflow_id = workflow.workflow_id.clone();

        match executor.start_workflow(start_input) {
            Ok(workflow_id) => {
                task.add_output(Self::WORKFLOW_ID, workflow_id);
                task.set_status(TaskStatus::Completed);
            }
            Err(e) if e.is_transient() => {
                warn!(
                    "A transient error occurred in task: {}, workflow: {}, will retry, {}",
                    task.task_id, workflow.workflow_id, e
                );
            }
            Err(e) => {
                error!(
                    "Error starting workflow from task: {}, workflow: {}, {}",
                    task.task_id, workflow.workflow_id, e
                );
                task.set_failed(TaskStatus::Failed, e.display_text());
            }
        }
        Ok(())
    }

    fn is_async(&self) -> bool {
        true
    }
}
