use std::str::FromStr;

use serde::Serialize;
use strum_macros::{AsRefStr, EnumString};

use crate::metadata::JsonExt;
use crate::prelude::*;
use crate::{TaskType, WorkflowTask};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDef {
    pub name: InlineStr,
    pub description: InlineStr,
    /// Numeric field used to identify the version of the schema. Use incrementing numbers.
    pub version: i32,
    pub tasks: Vec<WorkflowTask>,
    /// List of input parameters. Used for documenting the required inputs to workflow
    pub input_parameters: Vec<InlineStr>,
    /// JSON template used to generate the output of the workflow
    pub output_parameters: HashMap<InlineStr, Object>,
    /// Default input values.
    pub input_template: HashMap<InlineStr, Object>,
    /// Workflow to be run on current Workflow failure. Useful for cleanup or post actions on
    /// failure. A value starting with `$` is resolved from the workflow input.
    pub failure_workflow: InlineStr,
    pub schema_version: i32,
    /// Flag to allow Workflow restarts
    pub restartable: bool,
    /// Enable status callback.
    pub workflow_status_listener_enabled: bool,
    pub owner_app: InlineStr,
    pub owner_email: InlineStr,
    /// The timeout in seconds after which the workflow will be marked as TIMED_OUT if it hasn't
    /// been moved to a terminal state. 0 means no timeout.
    pub timeout_seconds: i32,
    pub timeout_policy: TimeoutPolicy,
    pub variables: HashMap<InlineStr, Object>,

    pub create_time: i64,
    pub update_time: i64,
}

impl WorkflowDef {
    pub fn new(name: &str, version: i32) -> Self {
        Self {
            name: name.into(),
            description: InlineStr::new(),
            version,
            tasks: Vec::default(),
            input_parameters: Vec::default(),
            output_parameters: HashMap::default(),
            input_template: HashMap::default(),
            failure_workflow: InlineStr::new(),
            schema_version: 2,
            restartable: true,
            workflow_status_listener_enabled: false,
            owner_app: InlineStr::new(),
            owner_email: InlineStr::new(),
            timeout_seconds: 0,
            timeout_policy: TimeoutPolicy::AlertOnly,
            variables: HashMap::default(),
            create_time: 0,
            update_time: 0,
        }
    }

    /// The node to run once `task_reference_name` is done, `None` at the end of the workflow or
    /// of a loop body.
    pub fn get_next_task(&self, task_reference_name: &str) -> Option<&WorkflowTask> {
        if let Some(workflow_task) = self.get_task_by_ref_name(task_reference_name) {
            if workflow_task.task_type() == TaskType::Terminate {
                return None;
            }
        }

        let mut iterator = self.tasks.iter();
        while let Some(task) = iterator.next() {
            if task.task_reference_name.eq(task_reference_name) {
                break;
            }
            if let Some(next_task) = task.next(task_reference_name, None) {
                return Some(next_task);
            } else if task.task_type() == TaskType::DoWhile
                && !task.task_reference_name.eq(task_reference_name)
                && task.has(task_reference_name)
            {
                // the last task of a loop body, the loop task decides what comes next
                return None;
            }

            if task.has(task_reference_name) {
                break;
            }
        }

        iterator.next()
    }

    pub fn get_task_by_ref_name(&self, task_reference_name: &str) -> Option<&WorkflowTask> {
        self.collect_tasks()
            .into_iter()
            .find(|x| x.task_reference_name.eq(task_reference_name))
    }

    pub fn collect_tasks(&self) -> Vec<&WorkflowTask> {
        let mut tasks = Vec::default();
        for workflow_task in &self.tasks {
            tasks.extend(workflow_task.collect_tasks())
        }
        tasks
    }

    pub fn populate_tasks<F>(&mut self, populate_fn: &mut F) -> RegorResult<()>
    where
        F: FnMut(&mut WorkflowTask) -> RegorResult<()>,
    {
        for workflow_task in &mut self.tasks {
            workflow_task.populate_tasks(populate_fn)?;
        }
        Ok(())
    }

    /// Reference names must be unique across the fully expanded task tree.
    pub fn validate(&self) -> RegorResult<()> {
        if self.name.is_empty() {
            return str_err!(IllegalArgument, "WorkflowDef name cannot be empty");
        }
        if self.tasks.is_empty() {
            return fmt_err!(IllegalArgument, "WorkflowDef {} has no tasks", self.name);
        }
        let mut seen = HashSet::new();
        for task in self.collect_tasks() {
            if !seen.insert(task.task_reference_name.as_str()) {
                return fmt_err!(
                    IllegalArgument,
                    "taskReferenceName: {} should be unique across tasks for workflow: {}",
                    task.task_reference_name,
                    self.name
                );
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> RegorResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl TryFrom<&serde_json::Value> for WorkflowDef {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, ErrorCode> {
        let workflow_def = Self {
            name: value.required_str("name")?,
            description: value.str_or("description", "")?,
            version: value.i32_or("version", 1)?,
            tasks: WorkflowTask::try_from_jsonlist(
                value
                    .field("tasks")
                    .and_then(|x| x.as_array())
                    .ok_or_else(|| {
                        ErrorCode::IllegalArgument("WorkflowDef: tasks not found or not array")
                    })?,
            )?,
            input_parameters: value.str_list("inputParameters")?,
            output_parameters: value.object_map("outputParameters")?,
            input_template: value.object_map("inputTemplate")?,
            failure_workflow: value.str_or("failureWorkflow", "")?,
            schema_version: 2,
            restartable: value.bool_or("restartable", true)?,
            workflow_status_listener_enabled: value
                .bool_or("workflowStatusListenerEnabled", false)?,
            owner_app: value.str_or("ownerApp", "")?,
            owner_email: value.str_or("ownerEmail", "")?,
            timeout_seconds: value.i32_or("timeoutSeconds", 0)?,
            timeout_policy: TimeoutPolicy::from_str(
                value.str_or("timeoutPolicy", "ALERT_ONLY")?.as_str(),
            )
            .map_err(|_| ErrorCode::IllegalArgument("WorkflowDef: timeoutPolicy invalid"))?,
            variables: value.object_map("variables")?,
            create_time: 0,
            update_time: 0,
        };
        workflow_def.validate()?;
        Ok(workflow_def)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, EnumString, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeoutPolicy {
    /// Workflow is marked as TIMED_OUT and terminated
    TimeOutWf,
    /// Registers a counter (workflow_failure with status tag set to TIMED_OUT)
    AlertOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(tasks: serde_json::Value) -> RegorResult<WorkflowDef> {
        WorkflowDef::try_from(&serde_json::json!({"name": "wf", "tasks": tasks}))
    }

    #[test]
    fn next_task_through_switch_and_loop() {
        let def = def(serde_json::json!([
            {
                "name": "sw", "taskReferenceName": "sw", "type": "SWITCH",
                "evaluatorType": "value-param", "expression": "k",
                "decisionCases": {"x": [{"name": "x1", "taskReferenceName": "x1"}]},
                "defaultCase": [{"name": "d1", "taskReferenceName": "d1"}]
            },
            {
                "name": "loop", "taskReferenceName": "loop", "type": "DO_WHILE",
                "loopCondition": "false",
                "loopOver": [{"name": "l1", "taskReferenceName": "l1"}]
            },
            {"name": "end", "taskReferenceName": "end"}
        ]))
        .unwrap();

        assert_eq!(def.get_next_task("x1").unwrap().task_reference_name, "loop");
        assert_eq!(def.get_next_task("sw").unwrap().task_reference_name, "loop");
        assert_eq!(def.get_next_task("l1").unwrap().task_reference_name, "loop");
        assert_eq!(def.get_next_task("loop").unwrap().task_reference_name, "end");
        assert!(def.get_next_task("end").is_none());
    }

    #[test]
    fn duplicate_reference_names_rejected() {
        let err = def(serde_json::json!([
            {"name": "a", "taskReferenceName": "a"},
            {"name": "b", "taskReferenceName": "a"}
        ]))
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::illegal_argument_code());
    }

    #[test]
    fn round_trips_through_json() {
        let original = def(serde_json::json!([
            {"name": "a", "taskReferenceName": "a", "inputParameters": {"k": "${workflow.input.k}"}}
        ]))
        .unwrap();
        let copy = WorkflowDef::try_from(&original.to_json().unwrap()).unwrap();
        assert_eq!(copy.tasks[0].input_parameters, original.tasks[0].input_parameters);
    }
}
