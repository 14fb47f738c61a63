use chrono::Utc;
use regor_common::prelude::*;
use regor_common::WorkflowDef;

use super::task_model::TaskModel;
use super::WorkflowStatus;
use crate::runtime::StartWorkflowInput;

#[derive(Clone, Debug)]
pub struct WorkflowModel {
    pub workflow_id: InlineStr,
    pub correlation_id: InlineStr,
    pub priority: i32,
    pub workflow_definition: Arc<WorkflowDef>,
    pub parent_workflow_id: InlineStr,
    pub parent_workflow_task_id: InlineStr,
    pub tasks: Vec<TaskModel>,
    pub task_to_domain: HashMap<InlineStr, InlineStr>,

    pub event: InlineStr,
    pub variables: HashMap<InlineStr, Object>,
    pub input: HashMap<InlineStr, Object>,
    pub output: HashMap<InlineStr, Object>,
    pub external_input_payload_storage_path: InlineStr,
    pub external_output_payload_storage_path: InlineStr,

    pub status: WorkflowStatus,
    pub previous_status: Option<WorkflowStatus>,
    pub reason_for_incompletion: InlineStr,
    /// Capture the failed taskId if the workflow execution failed because of task failure
    pub failed_task_id: InlineStr,
    pub failed_task_names: HashSet<InlineStr>,
    pub failed_reference_task_names: HashSet<InlineStr>,
    pub re_run_from_workflow_id: InlineStr,
    pub last_retried_time: i64,

    pub owner_app: InlineStr,
    pub create_time: i64,
    pub created_by: InlineStr,
    pub updated_time: i64,
    pub updated_by: InlineStr,
    pub end_time: i64,
}

impl WorkflowModel {
    pub fn new(
        workflow_id: InlineStr,
        workflow_definition: Arc<WorkflowDef>,
        input: StartWorkflowInput,
    ) -> Self {
        let variables = workflow_definition.variables.clone();
        let owner_app = workflow_definition.owner_app.clone();
        Self {
            workflow_id,
            correlation_id: input.correlation_id,
            priority: input.priority.unwrap_or(0),
            workflow_definition,
            parent_workflow_id: input.parent_workflow_id,
            parent_workflow_task_id: input.parent_workflow_task_id,
            tasks: Vec::default(),
            task_to_domain: input.task_to_domain,

            event: input.event,
            variables,
            input: HashMap::default(),
            output: HashMap::default(),
            external_input_payload_storage_path: InlineStr::new(),
            external_output_payload_storage_path: InlineStr::new(),

            status: WorkflowStatus::Running,
            previous_status: None,
            reason_for_incompletion: InlineStr::new(),
            failed_task_id: InlineStr::new(),
            failed_task_names: HashSet::default(),
            failed_reference_task_names: HashSet::default(),
            re_run_from_workflow_id: InlineStr::new(),
            last_retried_time: 0,

            owner_app,
            create_time: Utc::now().timestamp_millis(),
            created_by: input.created_by,
            updated_time: 0,
            updated_by: InlineStr::new(),
            end_time: 0,
        }
    }

    pub fn has_parent(&self) -> bool {
        !self.parent_workflow_id.trim().is_empty()
    }

    pub fn to_short_string(&self) -> String {
        format!(
            "{}.{}/{}",
            self.workflow_definition.name, self.workflow_definition.version, self.workflow_id
        )
    }

    pub fn set_status(&mut self, status: WorkflowStatus) {
        if self.status != status {
            self.previous_status = Some(self.status);
        }
        self.status = status;
    }

    /// The latest task scheduled for a reference name, if any.
    pub fn get_task_by_ref_name(&self, ref_name: &str) -> RegorResult<Option<&TaskModel>> {
        if ref_name.is_empty() {
            return str_err!(
                IllegalArgument,
                "refName passed is empty. For dynamic tasks, make sure referenceTaskName is set"
            );
        }

        Ok(self
            .tasks
            .iter()
            .rev()
            .find(|task| task.reference_task_name.eq(ref_name)))
    }

    pub fn get_task_by_id(&self, task_id: &str) -> Option<&TaskModel> {
        self.tasks.iter().find(|task| task.task_id.eq(task_id))
    }

    pub fn get_task_by_id_mut(&mut self, task_id: &str) -> Option<&mut TaskModel> {
        self.tasks.iter_mut().find(|task| task.task_id.eq(task_id))
    }

    /// Timestamp the timeout clock of the workflow starts from.
    pub fn start_time(&self) -> i64 {
        if self.last_retried_time > 0 {
            self.last_retried_time
        } else {
            self.create_time
        }
    }
}

#[cfg(test)]
mod tests {
    use regor_common::prelude::*;
    use regor_common::WorkflowDef;

    use super::WorkflowModel;
    use crate::model::{TaskModel, TaskStatus};
    use crate::runtime::StartWorkflowInput;

    #[test]
    fn get_task_by_ref_name_returns_latest_attempt() {
        let def = Arc::new(WorkflowDef::new("wf", 1));
        let mut workflow = WorkflowModel::new(
            "wf-1".into(),
            def,
            StartWorkflowInput::new("wf".into(), HashMap::new()),
        );
        for retry in 0..3 {
            let mut task = TaskModel::new(TaskStatus::Failed);
            task.reference_task_name = "t1".into();
            task.retry_count = retry;
            workflow.tasks.push(task);
        }

        let task = workflow.get_task_by_ref_name("t1").unwrap().unwrap();
        assert_eq!(task.retry_count, 2);
        assert!(workflow.get_task_by_ref_name("t2").unwrap().is_none());
        assert!(workflow.get_task_by_ref_name("").is_err());
    }
}
