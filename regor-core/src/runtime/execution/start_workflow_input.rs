use regor_common::prelude::*;
use regor_common::{StartWorkflowRequest, WorkflowDef};

/// Everything needed to create a new workflow instance, whether requested by a client, by a
/// parent workflow or by a retry of a failed workflow.
#[derive(Clone, Debug, Default)]
pub struct StartWorkflowInput {
    pub name: InlineStr,
    pub version: Option<i32>,
    pub workflow_definition: Option<WorkflowDef>,
    pub workflow_input: HashMap<InlineStr, Object>,
    pub external_input_payload_storage_path: InlineStr,
    pub correlation_id: InlineStr,
    pub priority: Option<i32>,
    pub task_to_domain: HashMap<InlineStr, InlineStr>,
    pub created_by: InlineStr,

    pub parent_workflow_id: InlineStr,
    pub parent_workflow_task_id: InlineStr,
    pub event: InlineStr,
    pub workflow_id: InlineStr,
    pub triggering_workflow_id: InlineStr,
}

impl From<StartWorkflowRequest> for StartWorkflowInput {
    fn from(request: StartWorkflowRequest) -> Self {
        Self {
            name: request.name,
            version: request.version,
            workflow_definition: request.workflow_def,
            workflow_input: request.input,
            external_input_payload_storage_path: request.external_input_payload_storage_path,
            correlation_id: request.correlation_id,
            priority: Some(request.priority),
            task_to_domain: request.task_to_domain,
            created_by: request.created_by,
            ..Default::default()
        }
    }
}

impl StartWorkflowInput {
    pub fn new(name: InlineStr, workflow_input: HashMap<InlineStr, Object>) -> Self {
        Self {
            name,
            workflow_input,
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_workflow_id: &str, parent_workflow_task_id: &str) -> Self {
        self.parent_workflow_id = parent_workflow_id.into();
        self.parent_workflow_task_id = parent_workflow_task_id.into();
        self
    }
}
