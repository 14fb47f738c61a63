use regor_common::prelude::*;
use regor_common::{Action, ActionType, StartWorkflowAction, TaskDetails, TaskResult, TaskResultStatus};

use crate::model::TaskModel;
use crate::runtime::execution::{StartWorkflowInput, WorkflowExecutor};
use crate::utils::ParametersUtils;

const EVENT_MESSAGE_ID_KEY: &str = "regor.event.messageId";
const EVENT_NAME_KEY: &str = "regor.event.name";

/// Runs one action of an event handler for a message payload.
///
/// The returned map becomes the output of the event execution. A transient error leaves the
/// execution in progress so the message is delivered again.
pub trait ActionProcessor: Send + Sync {
    fn execute(
        &self,
        action: &Action,
        payload: &serde_json::Value,
        event: &str,
        message_id: &str,
    ) -> RegorResult<HashMap<InlineStr, Object>>;
}

/// Starts workflows and completes or fails tasks through the `WorkflowExecutor`.
pub struct SimpleActionProcessor {
    executor: Arc<WorkflowExecutor>,
}

impl SimpleActionProcessor {
    pub fn new(executor: Arc<WorkflowExecutor>) -> Self {
        Self { executor }
    }

    /// Parses the string values holding a json object or array, at any depth.
    pub fn expand(value: serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::String(text) => {
                let trimmed = text.trim_start();
                if trimmed.starts_with('{') || trimmed.starts_with('[') {
                    match serde_json::from_str::<serde_json::Value>(&text) {
                        Ok(parsed) => Self::expand(parsed),
                        Err(_) => serde_json::Value::String(text),
                    }
                } else {
                    serde_json::Value::String(text)
                }
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Self::expand).collect())
            }
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, Self::expand(v))).collect(),
            ),
            other => other,
        }
    }

    /// Only a json object can be addressed by `${...}` paths, anything else resolves nothing.
    fn document(payload: &serde_json::Value) -> HashMap<InlineStr, Object> {
        payload
            .as_object()
            .map(Object::convert_jsonmap_to_hashmap)
            .unwrap_or_default()
    }

    fn update_task(
        &self,
        details: &TaskDetails,
        status: TaskResultStatus,
        payload: &serde_json::Value,
        event: &str,
        message_id: &str,
    ) -> RegorResult<HashMap<InlineStr, Object>> {
        let mut template = details.output.clone();
        template.insert("workflowId".into(), (&details.workflow_id).into());
        template.insert("taskId".into(), (&details.task_id).into());
        template.insert("taskRefName".into(), (&details.task_ref_name).into());
        let mut replaced = ParametersUtils::replace_with_document(&template, Self::document(payload));

        let resolved = |key: &str| -> InlineStr {
            replaced
                .get(key)
                .and_then(|x| x.as_string().ok())
                .cloned()
                .unwrap_or_default()
        };
        let workflow_id = resolved("workflowId");
        let task_id = resolved("taskId");
        let task_ref_name = resolved("taskRefName");

        let mut output = object_map! {
            "workflowId" => &workflow_id,
            "taskId" => &task_id,
            "taskRefName" => &task_ref_name,
        };

        let task = match self.find_task(&workflow_id, &task_id, &task_ref_name) {
            Ok(Some(task)) => task,
            Ok(None) => {
                output.insert(
                    "error".into(),
                    format!(
                        "No task found with taskId: {}, reference name: {}, workflowId: {}",
                        task_id, task_ref_name, workflow_id
                    )
                    .into(),
                );
                return Ok(output);
            }
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                output.insert("error".into(), e.message().into());
                return Ok(output);
            }
        };

        replaced.insert(EVENT_MESSAGE_ID_KEY.into(), message_id.into());
        replaced.insert(EVENT_NAME_KEY.into(), event.into());
        let mut result = TaskResult::new(&task.workflow_instance_id, &task.task_id, status)
            .with_output(replaced);
        if status == TaskResultStatus::Failed {
            result.reason_for_incompletion = format!("Failed by the event {}", event).into();
        }

        match self.executor.update_task(result) {
            Ok(()) => {
                output.insert("task".into(), (&task.task_def_name).into());
                Ok(output)
            }
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                error!("Error updating task: {} from event {}: {}", task.task_id, event, e);
                output.insert("error".into(), e.message().into());
                Ok(output)
            }
        }
    }

    /// By id, or else the latest instance of the reference in the workflow.
    fn find_task(
        &self,
        workflow_id: &str,
        task_id: &str,
        task_ref_name: &str,
    ) -> RegorResult<Option<TaskModel>> {
        if !task_id.is_empty() {
            return self.executor.get_task(task_id);
        }
        if workflow_id.is_empty() || task_ref_name.is_empty() {
            return Ok(None);
        }
        let workflow = self.executor.get_workflow(workflow_id, true)?;
        Ok(workflow
            .tasks
            .into_iter()
            .filter(|x| {
                x.reference_task_name == task_ref_name
                    || x.ref_name_without_iteration() == task_ref_name
            })
            .max_by_key(|x| x.seq))
    }

    fn start_workflow(
        &self,
        params: &StartWorkflowAction,
        payload: &serde_json::Value,
        event: &str,
        message_id: &str,
    ) -> RegorResult<HashMap<InlineStr, Object>> {
        let document = Self::document(payload);
        let mut workflow_input = ParametersUtils::replace_with_document(&params.input, document.clone());
        workflow_input.insert(EVENT_MESSAGE_ID_KEY.into(), message_id.into());
        workflow_input.insert(EVENT_NAME_KEY.into(), event.into());

        let correlation = object_map! { "correlationId" => &params.correlation_id };
        let correlation_id = ParametersUtils::replace_with_document(&correlation, document)
            .get("correlationId")
            .and_then(|x| x.as_string().ok())
            .cloned()
            .unwrap_or_default();

        let mut input = StartWorkflowInput::new(params.name.clone(), workflow_input);
        input.version = params.version;
        input.correlation_id = correlation_id;
        input.event = event.into();
        input.task_to_domain = params.task_to_domain.clone();

        match self.executor.start_workflow(input) {
            Ok(workflow_id) => Ok(object_map! { "workflowId" => workflow_id }),
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                error!("Error starting workflow: {} from event {}: {}", params.name, event, e);
                Ok(object_map! { "error" => e.message() })
            }
        }
    }
}

impl ActionProcessor for SimpleActionProcessor {
    fn execute(
        &self,
        action: &Action,
        payload: &serde_json::Value,
        event: &str,
        message_id: &str,
    ) -> RegorResult<HashMap<InlineStr, Object>> {
        debug!(
            "Executing action: {} for event: {} with messageId: {}",
            action.action.as_ref(),
            event,
            message_id
        );
        let expanded;
        let payload = if action.expand_inline_json {
            expanded = Self::expand(payload.clone());
            &expanded
        } else {
            payload
        };

        let missing = || {
            ErrorCode::IllegalArgument(format!(
                "Action {} carries no details",
                action.action.as_ref()
            ))
        };
        match action.action {
            ActionType::StartWorkflow => {
                let params = action.start_workflow.as_ref().ok_or_else(missing)?;
                self.start_workflow(params, payload, event, message_id)
            }
            ActionType::CompleteTask => {
                let details = action.complete_task.as_ref().ok_or_else(missing)?;
                self.update_task(details, TaskResultStatus::Completed, payload, event, message_id)
            }
            ActionType::FailTask => {
                let details = action.fail_task.as_ref().ok_or_else(missing)?;
                self.update_task(details, TaskResultStatus::Failed, payload, event, message_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SimpleActionProcessor;

    #[test]
    fn expand_parses_nested_json_strings() {
        let payload = json!({
            "body": "{\"status\": \"done\", \"items\": \"[1, 2]\"}",
            "text": "{not json",
            "plain": "hello",
            "list": ["{\"a\": 1}"]
        });
        let expanded = SimpleActionProcessor::expand(payload);
        assert_eq!(expanded["body"]["status"], "done");
        assert_eq!(expanded["body"]["items"], json!([1, 2]));
        assert_eq!(expanded["text"], "{not json");
        assert_eq!(expanded["plain"], "hello");
        assert_eq!(expanded["list"][0]["a"], 1);
    }
}
