use std::str::FromStr;

use serde::Serialize;
use strum_macros::{AsRefStr, EnumString};

use crate::metadata::JsonExt;
use crate::prelude::*;

/// Binds the messages of an event queue to the actions run for them.
///
/// `event` names the queue the handler listens to, `condition` is evaluated against the message
/// payload and the actions only run when it holds.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandler {
    pub name: InlineStr,
    pub event: InlineStr,
    pub condition: InlineStr,
    pub evaluator_type: InlineStr,
    pub actions: Vec<Action>,
    pub active: bool,
}

impl EventHandler {
    pub fn new(name: &str, event: &str) -> Self {
        Self {
            name: name.into(),
            event: event.into(),
            condition: InlineStr::new(),
            evaluator_type: InlineStr::new(),
            actions: Vec::default(),
            active: true,
        }
    }

    pub fn validate(&self) -> RegorResult<()> {
        if self.name.is_empty() {
            return str_err!(IllegalArgument, "Missing event handler name");
        }
        if self.event.is_empty() {
            return fmt_err!(IllegalArgument, "Missing event location of {}", self.name);
        }
        if self.actions.is_empty() {
            return fmt_err!(IllegalArgument, "No actions specified for {}", self.name);
        }
        for action in &self.actions {
            action.validate(&self.name)?;
        }
        Ok(())
    }
}

impl TryFrom<&serde_json::Value> for EventHandler {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        let actions = match value.field("actions") {
            None => Vec::default(),
            Some(json) => json
                .as_array()
                .ok_or_else(|| ErrorCode::IllegalArgument("actions invalid"))?
                .iter()
                .map(Action::try_from)
                .collect::<RegorResult<Vec<_>>>()?,
        };
        let handler = Self {
            name: value.required_str("name")?,
            event: value.required_str("event")?,
            condition: value.str_or("condition", "")?,
            evaluator_type: value.str_or("evaluatorType", "")?,
            actions,
            active: value.bool_or("active", false)?,
        };
        handler.validate()?;
        Ok(handler)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    StartWorkflow,
    CompleteTask,
    FailTask,
}

/// One action of an event handler. Only the details matching `action` are used.
#[derive(Clone, Debug, Serialize)]
pub struct Action {
    pub action: ActionType,
    pub start_workflow: Option<StartWorkflowAction>,
    pub complete_task: Option<TaskDetails>,
    pub fail_task: Option<TaskDetails>,
    /// String values of the payload holding json documents are parsed before substitution.
    #[serde(rename = "expandInlineJSON")]
    pub expand_inline_json: bool,
}

impl Action {
    pub fn start_workflow(details: StartWorkflowAction) -> Self {
        Self {
            action: ActionType::StartWorkflow,
            start_workflow: Some(details),
            complete_task: None,
            fail_task: None,
            expand_inline_json: false,
        }
    }

    pub fn complete_task(details: TaskDetails) -> Self {
        Self {
            action: ActionType::CompleteTask,
            start_workflow: None,
            complete_task: Some(details),
            fail_task: None,
            expand_inline_json: false,
        }
    }

    pub fn fail_task(details: TaskDetails) -> Self {
        Self {
            action: ActionType::FailTask,
            start_workflow: None,
            complete_task: None,
            fail_task: Some(details),
            expand_inline_json: false,
        }
    }

    fn validate(&self, handler: &str) -> RegorResult<()> {
        let present = match self.action {
            ActionType::StartWorkflow => self.start_workflow.is_some(),
            ActionType::CompleteTask => self.complete_task.is_some(),
            ActionType::FailTask => self.fail_task.is_some(),
        };
        if !present {
            return fmt_err!(
                IllegalArgument,
                "Action {} of {} has no {} details",
                self.action.as_ref(),
                handler,
                self.action.as_ref()
            );
        }
        Ok(())
    }
}

impl TryFrom<&serde_json::Value> for Action {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        let action = ActionType::from_str(value.required_str("action")?.as_str())
            .map_err(|_| ErrorCode::IllegalArgument("action invalid"))?;
        let task_details = |key: &str| -> RegorResult<Option<TaskDetails>> {
            value.field(key).map(TaskDetails::try_from).transpose()
        };
        Ok(Self {
            action,
            start_workflow: value
                .field("start_workflow")
                .map(StartWorkflowAction::try_from)
                .transpose()?,
            complete_task: task_details("complete_task")?,
            fail_task: task_details("fail_task")?,
            expand_inline_json: value.bool_or("expandInlineJSON", false)?,
        })
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowAction {
    pub name: InlineStr,
    pub version: Option<i32>,
    pub correlation_id: InlineStr,
    pub input: HashMap<InlineStr, Object>,
    pub task_to_domain: HashMap<InlineStr, InlineStr>,
}

impl TryFrom<&serde_json::Value> for StartWorkflowAction {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        Ok(Self {
            name: value.required_str("name")?,
            version: value.optional_i32("version")?,
            correlation_id: value.str_or("correlationId", "")?,
            input: value.object_map("input")?,
            task_to_domain: value.str_map("taskToDomain")?,
        })
    }
}

/// Locates the task an action updates: by `task_id`, or by `workflow_id` and `task_ref_name`.
/// Every field may hold a `${...}` expression resolved against the message payload.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    pub workflow_id: InlineStr,
    pub task_ref_name: InlineStr,
    pub task_id: InlineStr,
    pub output: HashMap<InlineStr, Object>,
}

impl TryFrom<&serde_json::Value> for TaskDetails {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        Ok(Self {
            workflow_id: value.str_or("workflowId", "")?,
            task_ref_name: value.str_or("taskRefName", "")?,
            task_id: value.str_or("taskId", "")?,
            output: value.object_map("output")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_handler_with_actions() {
        let json = serde_json::json!({
            "name": "on_encoded",
            "event": "regor:encode:notify",
            "condition": "$.status == 'done'",
            "active": true,
            "actions": [
                {
                    "action": "complete_task",
                    "complete_task": {
                        "workflowId": "${workflowId}",
                        "taskRefName": "wait_ref",
                        "output": {"url": "${url}"}
                    },
                    "expandInlineJSON": true
                },
                {
                    "action": "start_workflow",
                    "start_workflow": {"name": "publish", "version": 2}
                }
            ]
        });
        let handler = EventHandler::try_from(&json).unwrap();
        assert!(handler.active);
        assert_eq!(handler.actions.len(), 2);
        assert_eq!(handler.actions[0].action, ActionType::CompleteTask);
        assert!(handler.actions[0].expand_inline_json);
        let details = handler.actions[0].complete_task.as_ref().unwrap();
        assert_eq!(details.task_ref_name, "wait_ref");
        assert_eq!(
            handler.actions[1].start_workflow.as_ref().unwrap().version,
            Some(2)
        );
    }

    #[test]
    fn rejects_action_without_details() {
        let json = serde_json::json!({
            "name": "broken",
            "event": "sqs:anything",
            "actions": [{"action": "fail_task"}]
        });
        let err = EventHandler::try_from(&json).unwrap_err();
        assert_eq!(err.code(), ErrorCode::illegal_argument_code());

        let json = serde_json::json!({"name": "empty", "event": "sqs:anything"});
        assert!(EventHandler::try_from(&json).is_err());

        let json = serde_json::json!({
            "name": "unknown",
            "event": "sqs:anything",
            "actions": [{"action": "update_workflow"}]
        });
        assert!(EventHandler::try_from(&json).is_err());
    }
}
