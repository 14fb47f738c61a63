use crate::metadata::JsonExt;
use crate::prelude::*;
use crate::WorkflowDef;

#[derive(Clone, Debug)]
pub struct StartWorkflowRequest {
    /// Name of the Workflow. MUST be registered before starting workflow unless `workflow_def`
    /// is given.
    pub name: InlineStr,
    /// Workflow version, latest when absent
    pub version: Option<i32>,
    /// JSON object with key value params, that can be used by downstream tasks
    pub input: HashMap<InlineStr, Object>,
    /// Unique Id that correlates multiple Workflow executions
    pub correlation_id: InlineStr,
    /// The same "task definition" can be implemented in different "domains". When the workflow
    /// is started, the caller can specify which tasks need to run in a specific domain. The
    /// domain is then used in the queue name the task is pushed to.
    pub task_to_domain: HashMap<InlineStr, InlineStr>,
    /// An adhoc Workflow Definition to run, without registering.
    pub workflow_def: Option<WorkflowDef>,
    pub external_input_payload_storage_path: InlineStr,
    /// Priority level for the tasks within this workflow execution. Possible values are between 0
    /// - 99.
    pub priority: i32,
    pub created_by: InlineStr,
}

impl StartWorkflowRequest {
    pub fn new(name: &str, version: Option<i32>, input: HashMap<InlineStr, Object>) -> Self {
        Self {
            name: name.into(),
            version,
            input,
            correlation_id: InlineStr::default(),
            task_to_domain: HashMap::default(),
            workflow_def: None,
            external_input_payload_storage_path: InlineStr::default(),
            priority: 0,
            created_by: InlineStr::default(),
        }
    }
}

impl TryFrom<&serde_json::Value> for StartWorkflowRequest {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        let workflow_def = match value.field("workflowDef") {
            Some(json) => Some(WorkflowDef::try_from(json)?),
            None => None,
        };
        let name = match &workflow_def {
            Some(def) => def.name.clone(),
            None => value.required_str("name")?,
        };

        let priority = value.i32_or("priority", 0)?;
        if !(0..=99).contains(&priority) {
            return str_err!(IllegalArgument, "priority must in range [0..=99]");
        }

        Ok(Self {
            name,
            version: value.optional_i32("version")?,
            input: value.object_map("input")?,
            correlation_id: value.str_or("correlationId", "")?,
            task_to_domain: value.str_map("taskToDomain")?,
            workflow_def,
            external_input_payload_storage_path: value
                .str_or("externalInputPayloadStoragePath", "")?,
            priority,
            created_by: value.str_or("createdBy", "")?,
        })
    }
}

impl TryFrom<&Object> for StartWorkflowRequest {
    type Error = ErrorCode;
    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Map(_) => Self::try_from(&value.to_json()),
            _ => fmt_err!(IllegalArgument, "not a StartWorkflowRequest: {:?}", value),
        }
    }
}
