use serde::Serialize;

use crate::metadata::tasks::TaskDef;
use crate::metadata::JsonExt;
use crate::prelude::*;
use crate::{SubWorkflowParams, TaskType};

/// This is the task definition defined as part of the `WorkflowDef`. Control-flow tasks own their
/// nested task lists, so a workflow definition is a tree rather than a flat list.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTask {
    /// Name of the task. MUST be registered as a Task Type before starting workflow
    pub name: InlineStr,
    /// Alias used to refer the task within the workflow. MUST be unique within workflow.
    pub task_reference_name: InlineStr,
    /// Type of task. SIMPLE for tasks executed by remote workers, or one of the system task types
    #[serde(rename = "type")]
    pub type_: InlineStr,
    pub description: InlineStr,
    /// true or false. When set to true - workflow continues even if the task fails. The status of
    /// the task is reflected as COMPLETED_WITH_ERRORS
    pub optional: bool,
    /// JSON template that defines the input given to the task.
    pub input_parameters: HashMap<InlineStr, Object>,
    /// false to mark status COMPLETED upon execution; true to keep the task IN_PROGRESS and wait
    /// for an external event to complete it.
    pub async_complete: bool,
    /// Time in seconds to wait before making the task available to be polled by a worker.
    pub start_delay: i32,
    pub rate_limited: bool,
    /// Overrides `TaskDef::retry_count` when set.
    pub retry_count: Option<i32>,
    pub task_definition: Option<TaskDef>,

    /// SWITCH
    /// Type of the evaluator used. Supported types: value-param, javascript.
    pub evaluator_type: InlineStr,
    /// if `value-param`, Reference to provided key in inputParameters;
    /// if `javascript`, expression evaluated to compute value
    pub expression: InlineStr,
    /// SWITCH/DECISION
    pub decision_cases: HashMap<InlineStr, Vec<WorkflowTask>>,
    pub default_case: Vec<WorkflowTask>,
    /// DECISION
    pub case_value_param: InlineStr,
    pub case_expression: InlineStr,
    /// LAMBDA
    pub script_expression: InlineStr,

    /// DYNAMIC
    /// Name of the parameter from inputParameters whose value is used to schedule the task.
    pub dynamic_task_name_param: InlineStr,

    /// DO_WHILE
    /// Condition to be evaluated after every iteration. If an exception occurs during
    /// evaluation, the DO_WHILE task is set to FAILED_WITH_TERMINAL_ERROR.
    pub loop_condition: InlineStr,
    pub loop_over: Vec<WorkflowTask>,

    /// SUB_WORKFLOW
    pub sub_workflow_param: Option<SubWorkflowParams>,

    /// FORK_JOIN/JOIN/EXCLUSIVE_JOIN
    pub fork_tasks: Vec<Vec<WorkflowTask>>,
    pub join_on: Vec<InlineStr>,
    pub default_exclusive_join_task: Vec<InlineStr>,

    /// FORK_JOIN_DYNAMIC
    pub dynamic_fork_tasks_param: InlineStr,
    pub dynamic_fork_tasks_input_param_name: InlineStr,
    pub dynamic_fork_join_tasks_param: InlineStr,

    /// EVENT
    pub sink: InlineStr,
}

impl WorkflowTask {
    pub fn new(name: &str, task_reference_name: &str, type_: TaskType) -> Self {
        Self {
            name: name.into(),
            task_reference_name: task_reference_name.into(),
            type_: type_.as_ref().into(),
            description: InlineStr::default(),
            optional: false,
            input_parameters: HashMap::default(),
            async_complete: false,
            start_delay: 0,
            rate_limited: false,
            retry_count: None,
            task_definition: None,
            evaluator_type: InlineStr::default(),
            expression: InlineStr::default(),
            decision_cases: HashMap::default(),
            default_case: Vec::default(),
            case_value_param: InlineStr::default(),
            case_expression: InlineStr::default(),
            script_expression: InlineStr::default(),
            dynamic_task_name_param: InlineStr::default(),
            loop_condition: InlineStr::default(),
            loop_over: Vec::default(),
            sub_workflow_param: None,
            fork_tasks: Vec::default(),
            join_on: Vec::default(),
            default_exclusive_join_task: Vec::default(),
            dynamic_fork_tasks_param: InlineStr::default(),
            dynamic_fork_tasks_input_param_name: InlineStr::default(),
            dynamic_fork_join_tasks_param: InlineStr::default(),
            sink: InlineStr::default(),
        }
    }

    pub fn task_type(&self) -> TaskType {
        TaskType::of(self.type_.as_str())
    }

    fn children(&self) -> Vec<&Vec<WorkflowTask>> {
        let mut workflow_task_lists = Vec::default();
        match self.task_type() {
            TaskType::Decision | TaskType::Switch => {
                // sorted so that traversal order does not depend on hash order
                let mut cases: Vec<_> = self.decision_cases.iter().collect();
                cases.sort_by(|a, b| a.0.cmp(b.0));
                workflow_task_lists.extend(cases.into_iter().map(|(_, v)| v));
                workflow_task_lists.push(&self.default_case);
            }
            TaskType::ForkJoin => workflow_task_lists.extend(self.fork_tasks.iter()),
            TaskType::DoWhile => workflow_task_lists.push(&self.loop_over),
            _ => {}
        }
        workflow_task_lists
    }

    fn children_mut(&mut self) -> Vec<&mut Vec<WorkflowTask>> {
        let mut workflow_task_lists = Vec::default();
        match self.task_type() {
            TaskType::Decision | TaskType::Switch => {
                workflow_task_lists.extend(self.decision_cases.values_mut());
                workflow_task_lists.push(&mut self.default_case);
            }
            TaskType::ForkJoin => workflow_task_lists.extend(self.fork_tasks.iter_mut()),
            TaskType::DoWhile => workflow_task_lists.push(&mut self.loop_over),
            _ => {}
        }
        workflow_task_lists
    }

    /// This task followed by every task nested below it, depth first.
    pub fn collect_tasks(&self) -> Vec<&WorkflowTask> {
        let mut tasks = vec![self];
        for workflow_task_list in self.children() {
            for workflow_task in workflow_task_list {
                tasks.extend(workflow_task.collect_tasks())
            }
        }
        tasks
    }

    pub fn populate_tasks<F>(&mut self, populate_fn: &mut F) -> RegorResult<()>
    where
        F: FnMut(&mut WorkflowTask) -> RegorResult<()>,
    {
        populate_fn(self)?;
        for workflow_task_list in self.children_mut() {
            for workflow_task in workflow_task_list {
                workflow_task.populate_tasks(populate_fn)?;
            }
        }
        Ok(())
    }

    /// The task to run after `task_reference_name` when that task is nested inside this one.
    ///
    /// For a DO_WHILE whose last loop task is `task_reference_name`, the DO_WHILE itself is
    /// returned: it must run again to decide whether another iteration is needed.
    pub fn next<'a>(
        &'a self,
        task_reference_name: &str,
        parent: Option<&'a WorkflowTask>,
    ) -> Option<&'a WorkflowTask> {
        let task_type = self.task_type();
        match task_type {
            TaskType::DoWhile | TaskType::Decision | TaskType::Switch => {
                for workflow_tasks in self.children() {
                    let mut iterator = workflow_tasks.iter();
                    while let Some(task) = iterator.next() {
                        if task.task_reference_name.eq(task_reference_name) {
                            break;
                        }
                        if let Some(next_task) = task.next(task_reference_name, Some(self)) {
                            return Some(next_task);
                        }
                        if task.has(task_reference_name) {
                            break;
                        }
                    }
                    if let Some(next_task) = iterator.next() {
                        return Some(next_task);
                    }
                }
                if task_type == TaskType::DoWhile && self.has(task_reference_name) {
                    return Some(self);
                }
            }
            TaskType::ForkJoin => {
                let mut found = false;
                for workflow_tasks in self.children() {
                    let mut iterator = workflow_tasks.iter();
                    while let Some(task) = iterator.next() {
                        if task.task_reference_name.eq(task_reference_name) {
                            found = true;
                            break;
                        }
                        if let Some(next_task) = task.next(task_reference_name, Some(self)) {
                            return Some(next_task);
                        }
                        if task.has(task_reference_name) {
                            break;
                        }
                    }
                    if let Some(next_task) = iterator.next() {
                        return Some(next_task);
                    }
                    if found {
                        // end of a branch, the join is the sibling of this fork in the parent
                        if let Some(parent) = parent {
                            return parent.next(&self.task_reference_name, Some(parent));
                        }
                    }
                }
            }
            _ => {}
        }
        None
    }

    pub fn has(&self, task_reference_name: &str) -> bool {
        if self.task_reference_name.eq(task_reference_name) {
            return true;
        }
        self.children()
            .into_iter()
            .flatten()
            .any(|child| child.has(task_reference_name))
    }

    pub fn to_json(&self) -> RegorResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl TryFrom<&serde_json::Value> for WorkflowTask {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        let type_ = value.str_or("type", TaskType::Simple.as_ref())?;
        let task_type = TaskType::of(type_.as_str());
        let name = value.required_str("name")?;
        let task_reference_name = value.required_str("taskReferenceName")?;

        let mut task = WorkflowTask::new(&name, &task_reference_name, task_type);
        task.type_ = type_;
        task.description = value.str_or("description", "")?;
        task.optional = value.bool_or("optional", false)?;
        task.input_parameters = value.object_map("inputParameters")?;
        task.async_complete = value.bool_or("asyncComplete", false)?;
        task.start_delay = value.i32_or("startDelay", 0)?;
        task.rate_limited = value.bool_or("rateLimited", false)?;
        task.retry_count = value.optional_i32("retryCount")?;
        task.task_definition = match value.field("taskDefinition") {
            Some(json) => Some(TaskDef::try_from(json)?),
            None => None,
        };

        match task_type {
            TaskType::Switch => task.switch_try_from(value)?,
            TaskType::Decision => task.decision_try_from(value)?,
            TaskType::Dynamic => task.dynamic_try_from(value)?,
            TaskType::DoWhile => task.loop_try_from(value)?,
            TaskType::ForkJoin => task.fork_join_try_from(value)?,
            TaskType::ForkJoinDynamic => task.fork_join_dynamic_try_from(value)?,
            TaskType::Join => task.join_on = value.str_list("joinOn")?,
            TaskType::ExclusiveJoin => {
                task.join_on = value.str_list("joinOn")?;
                task.default_exclusive_join_task = value.str_list("defaultExclusiveJoinTask")?;
            }
            TaskType::SubWorkflow => {
                let params = value.field("subWorkflowParam").ok_or_else(|| {
                    ErrorCode::IllegalArgument(format!(
                        "subWorkflowParam not found for task {}",
                        task.task_reference_name
                    ))
                })?;
                task.sub_workflow_param = Some(SubWorkflowParams::try_from(params)?);
            }
            TaskType::Event => task.sink = value.required_str("sink")?,
            TaskType::Lambda => task.script_expression = value.str_or("scriptExpression", "")?,
            TaskType::SetVariable if task.input_parameters.is_empty() => {
                return str_err!(
                    IllegalArgument,
                    "inputParameters can not be empty when task type is SET_VARIABLE"
                );
            }
            _ => {}
        }

        Ok(task)
    }
}

impl WorkflowTask {
    pub fn try_from_jsonlist(jsonlist: &[serde_json::Value]) -> RegorResult<Vec<Self>> {
        let mut tasks = Vec::with_capacity(jsonlist.len());
        for json in jsonlist {
            tasks.push(json.try_into()?);
        }
        Ok(tasks)
    }

    pub fn try_from_jsonmap(
        jsonmap: &serde_json::Map<String, serde_json::Value>,
    ) -> RegorResult<HashMap<InlineStr, Vec<Self>>> {
        let mut tasks = HashMap::with_capacity(jsonmap.len());
        for (k, v) in jsonmap {
            let jsonlist = v
                .as_array()
                .ok_or(ErrorCode::IllegalArgument("decisionCases invalid"))?;
            tasks.insert(k.into(), Self::try_from_jsonlist(jsonlist)?);
        }
        Ok(tasks)
    }

    fn task_list(value: &serde_json::Value, key: &str) -> RegorResult<Vec<WorkflowTask>> {
        match value.field(key) {
            None => Ok(Vec::default()),
            Some(json) => Self::try_from_jsonlist(
                json.as_array()
                    .ok_or_else(|| ErrorCode::IllegalArgument(format!("{} invalid", key)))?,
            ),
        }
    }

    fn cases_try_from(&mut self, value: &serde_json::Value) -> RegorResult<()> {
        self.decision_cases = WorkflowTask::try_from_jsonmap(
            value
                .field("decisionCases")
                .and_then(|x| x.as_object())
                .ok_or(ErrorCode::IllegalArgument("decisionCases invalid"))?,
        )?;
        self.default_case = Self::task_list(value, "defaultCase")?;
        Ok(())
    }

    fn switch_try_from(&mut self, value: &serde_json::Value) -> RegorResult<()> {
        self.evaluator_type = value.required_str("evaluatorType")?;
        self.expression = value.required_str("expression")?;
        if self.expression.is_empty() {
            return str_err!(IllegalArgument, "expression can not be empty");
        }
        self.cases_try_from(value)
    }

    fn decision_try_from(&mut self, value: &serde_json::Value) -> RegorResult<()> {
        self.case_value_param = value.str_or("caseValueParam", "")?;
        self.case_expression = value.str_or("caseExpression", "")?;
        if self.case_value_param.is_empty() && self.case_expression.is_empty() {
            return fmt_err!(
                IllegalArgument,
                "caseValueParam or caseExpression is required for DECISION task {}",
                self.task_reference_name
            );
        }
        self.cases_try_from(value)
    }

    fn dynamic_try_from(&mut self, value: &serde_json::Value) -> RegorResult<()> {
        self.dynamic_task_name_param = value.required_str("dynamicTaskNameParam")?;
        if !self
            .input_parameters
            .contains_key(&self.dynamic_task_name_param)
        {
            return fmt_err!(
                IllegalArgument,
                "dynamicTaskNameParam invalid: can not find {} in inputParameters",
                self.dynamic_task_name_param
            );
        }
        Ok(())
    }

    fn loop_try_from(&mut self, value: &serde_json::Value) -> RegorResult<()> {
        self.loop_condition = value.required_str("loopCondition")?;
        self.loop_over = Self::task_list(value, "loopOver")?;
        if self.loop_over.is_empty() {
            return str_err!(IllegalArgument, "loopOver can not be empty");
        }
        Ok(())
    }

    fn fork_join_try_from(&mut self, value: &serde_json::Value) -> RegorResult<()> {
        let forks = value
            .field("forkTasks")
            .and_then(|x| x.as_array())
            .ok_or(ErrorCode::IllegalArgument("forkTasks invalid"))?;
        for fork in forks {
            let branch = Self::try_from_jsonlist(
                fork.as_array()
                    .ok_or(ErrorCode::IllegalArgument("forkTasks invalid, not a list"))?,
            )?;
            if branch.is_empty() {
                return str_err!(IllegalArgument, "forkTasks branch can not be empty");
            }
            self.fork_tasks.push(branch);
        }
        if self.fork_tasks.is_empty() {
            return str_err!(IllegalArgument, "forkTasks can not be empty");
        }
        Ok(())
    }

    fn fork_join_dynamic_try_from(&mut self, value: &serde_json::Value) -> RegorResult<()> {
        self.dynamic_fork_tasks_param = value.str_or("dynamicForkTasksParam", "")?;
        self.dynamic_fork_tasks_input_param_name =
            value.str_or("dynamicForkTasksInputParamName", "")?;
        self.dynamic_fork_join_tasks_param = value.str_or("dynamicForkJoinTasksParam", "")?;
        if self.dynamic_fork_tasks_param.is_empty() && self.dynamic_fork_join_tasks_param.is_empty()
        {
            return str_err!(
                IllegalArgument,
                "dynamicForkTasksParam or dynamicForkJoinTasksParam is required"
            );
        }
        if !self.dynamic_fork_tasks_param.is_empty()
            && self.dynamic_fork_tasks_input_param_name.is_empty()
        {
            return str_err!(
                IllegalArgument,
                "dynamicForkTasksInputParamName is required with dynamicForkTasksParam"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fork_def() -> Vec<WorkflowTask> {
        let json = serde_json::json!([
            {
                "name": "fork", "taskReferenceName": "fork", "type": "FORK_JOIN",
                "forkTasks": [
                    [{"name": "a", "taskReferenceName": "a"}, {"name": "a2", "taskReferenceName": "a2"}],
                    [{"name": "b", "taskReferenceName": "b"}]
                ]
            },
            {"name": "join", "taskReferenceName": "join", "type": "JOIN", "joinOn": ["a2", "b"]},
            {"name": "after", "taskReferenceName": "after"}
        ]);
        WorkflowTask::try_from_jsonlist(json.as_array().unwrap()).unwrap()
    }

    #[test]
    fn fork_traversal() {
        let tasks = fork_def();
        let fork = &tasks[0];
        assert!(fork.has("a2"));
        assert!(!fork.has("join"));
        assert_eq!(fork.next("a", None).unwrap().task_reference_name, "a2");
        assert!(fork.next("a2", None).is_none());
        assert_eq!(fork.collect_tasks().len(), 4);
        assert_eq!(tasks[1].join_on, vec![InlineStr::from("a2"), "b".into()]);
    }

    #[test]
    fn do_while_returns_itself_after_last_loop_task() {
        let json = serde_json::json!({
            "name": "loop", "taskReferenceName": "loop", "type": "DO_WHILE",
            "loopCondition": "$.loop['iteration'] < 3",
            "loopOver": [{"name": "x", "taskReferenceName": "x"}, {"name": "y", "taskReferenceName": "y"}]
        });
        let task = WorkflowTask::try_from(&json).unwrap();
        assert_eq!(task.next("x", None).unwrap().task_reference_name, "y");
        assert_eq!(task.next("y", None).unwrap().task_reference_name, "loop");
    }

    #[test]
    fn populate_reaches_nested_tasks() {
        let mut tasks = fork_def();
        let mut visited = 0;
        for task in tasks.iter_mut() {
            task.populate_tasks(&mut |t: &mut WorkflowTask| {
                t.description = "seen".into();
                visited += 1;
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(visited, 6);
        assert_eq!(tasks[0].fork_tasks[0][1].description, "seen");
    }
}
