use serde::Serialize;

use crate::metadata::JsonExt;
use crate::prelude::*;
use crate::WorkflowDef;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubWorkflowParams {
    pub name: InlineStr,
    /// Latest version is used when absent.
    pub version: Option<i32>,
    pub task_to_domain: HashMap<InlineStr, InlineStr>,
    /// An inline definition, run without registering it. Takes precedence over name/version.
    pub workflow_definition: Option<Box<WorkflowDef>>,
}

impl TryFrom<&serde_json::Value> for SubWorkflowParams {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        let workflow_definition = match value.field("workflowDefinition") {
            Some(json) => Some(Box::new(WorkflowDef::try_from(json)?)),
            None => None,
        };
        let name = match &workflow_definition {
            Some(def) => def.name.clone(),
            None => value.required_str("name")?,
        };
        Ok(Self {
            name,
            version: value.optional_i32("version")?,
            task_to_domain: value.str_map("taskToDomain")?,
            workflow_definition,
        })
    }
}
