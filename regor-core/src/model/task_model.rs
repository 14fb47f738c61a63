use chrono::Utc;
use numtoa::NumToA;
use regor_common::prelude::*;
use regor_common::{TaskDef, TaskResultStatus, TaskUtils, WorkflowTask};
use strum_macros::{AsRefStr, EnumString};

/// One scheduled occurrence of a workflow task within a workflow instance.
#[derive(Clone, Debug)]
pub struct TaskModel {
    pub task_type: InlineStr,
    pub status: TaskStatus,
    pub reference_task_name: InlineStr,
    pub retry_count: i32,
    pub seq: i32,
    pub correlation_id: InlineStr,
    pub poll_count: i32,
    pub task_def_name: InlineStr,
    /// Time when the task was scheduled
    pub scheduled_time: i64,
    /// Time when the task was first polled
    pub start_time: i64,
    /// Time when the task completed executing
    pub end_time: i64,
    /// Time when the task was last updated
    pub update_time: i64,
    pub start_delay_in_seconds: i32,
    pub retried_task_id: InlineStr,
    pub retried: bool,
    pub executed: bool,
    pub callback_from_worker: bool,
    pub response_timeout_seconds: i64,
    pub workflow_instance_id: InlineStr,
    pub workflow_type: InlineStr,
    pub task_id: InlineStr,
    pub reason_for_incompletion: InlineStr,
    pub callback_after_seconds: i64,
    pub worker_id: InlineStr,
    pub workflow_task: Option<WorkflowTask>,
    pub domain: InlineStr,
    pub rate_limit_per_frequency: i32,
    pub rate_limit_frequency_in_seconds: i32,
    pub external_input_payload_storage_path: InlineStr,
    pub external_output_payload_storage_path: InlineStr,
    pub workflow_priority: i32,
    pub execution_name_space: InlineStr,
    pub isolation_group_id: InlineStr,
    pub iteration: i32,
    pub sub_workflow_id: InlineStr,
    /// Timeout after which the wait task should be marked as completed
    pub wait_timeout: i64,
    /// A sub workflow associated with this SUB_WORKFLOW task had an action performed on it
    /// directly (retried, restarted).
    pub sub_workflow_changed: bool,
    pub input_data: HashMap<InlineStr, Object>,
    pub output_data: HashMap<InlineStr, Object>,
}

impl TaskModel {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            task_type: InlineStr::new(),
            status,
            reference_task_name: InlineStr::new(),
            retry_count: 0,
            seq: 0,
            correlation_id: InlineStr::new(),
            poll_count: 0,
            task_def_name: InlineStr::new(),
            scheduled_time: 0,
            start_time: 0,
            end_time: 0,
            update_time: 0,
            start_delay_in_seconds: 0,
            retried_task_id: InlineStr::new(),
            retried: false,
            executed: false,
            callback_from_worker: true,
            response_timeout_seconds: 0,
            workflow_instance_id: InlineStr::new(),
            workflow_type: InlineStr::new(),
            task_id: InlineStr::new(),
            reason_for_incompletion: InlineStr::new(),
            callback_after_seconds: 0,
            worker_id: InlineStr::new(),
            workflow_task: None,
            domain: InlineStr::new(),
            rate_limit_per_frequency: 0,
            rate_limit_frequency_in_seconds: 0,
            external_input_payload_storage_path: InlineStr::new(),
            external_output_payload_storage_path: InlineStr::new(),
            workflow_priority: 0,
            execution_name_space: InlineStr::new(),
            isolation_group_id: InlineStr::new(),
            iteration: 0,
            sub_workflow_id: InlineStr::new(),
            wait_timeout: 0,
            sub_workflow_changed: false,
            input_data: HashMap::new(),
            output_data: HashMap::new(),
        }
    }

    /// Takes what identifies the task in its workflow from `other`, leaving the run state as is.
    pub fn copy_definition_from(&mut self, other: &TaskModel) {
        self.task_type = other.task_type.clone();
        self.task_def_name = other.task_def_name.clone();
        self.reference_task_name = other.reference_task_name.clone();
        self.workflow_instance_id = other.workflow_instance_id.clone();
        self.workflow_type = other.workflow_type.clone();
        self.correlation_id = other.correlation_id.clone();
        self.workflow_task = other.workflow_task.clone();
        self.workflow_priority = other.workflow_priority;
        self.input_data = other.input_data.clone();
        self.external_input_payload_storage_path = other.external_input_payload_storage_path.clone();
        self.callback_from_worker = other.callback_from_worker;
        self.response_timeout_seconds = other.response_timeout_seconds;
        self.rate_limit_per_frequency = other.rate_limit_per_frequency;
        self.rate_limit_frequency_in_seconds = other.rate_limit_frequency_in_seconds;
        self.domain = other.domain.clone();
        self.execution_name_space = other.execution_name_space.clone();
        self.isolation_group_id = other.isolation_group_id.clone();
        self.iteration = other.iteration;
    }

    pub fn get_task_definition(&self) -> Option<&TaskDef> {
        self.workflow_task
            .as_ref()
            .and_then(|x| x.task_definition.as_ref())
    }

    /// Unique key of a task instance within its workflow: the reference name plus retry count.
    pub fn get_task_key(&self) -> InlineStr {
        let mut task_name = self.reference_task_name.clone();
        task_name.push('_');
        task_name.push_str(self.retry_count.numtoa_str(10, &mut [0u8; 16]));
        task_name
    }

    pub fn is_loop_over_task(&self) -> bool {
        self.iteration > 0
    }

    pub fn is_optional(&self) -> bool {
        self.workflow_task
            .as_ref()
            .map(|x| x.optional)
            .unwrap_or(false)
    }

    /// The reference name without the loop iteration suffix.
    pub fn ref_name_without_iteration(&self) -> &str {
        TaskUtils::remove_iteration_from_task_ref_name(&self.reference_task_name)
    }

    pub fn get_queue_wait_time(&self) -> i64 {
        if self.start_time > 0 && self.scheduled_time > 0 {
            if self.update_time > 0 && self.callback_after_seconds > 0 {
                let wait_time = Utc::now().timestamp_millis()
                    - (self.update_time + self.callback_after_seconds * 1000);
                wait_time.max(0)
            } else {
                self.start_time - self.scheduled_time
            }
        } else {
            0
        }
    }

    pub fn add_input(&mut self, key: &str, value: impl Into<Object>) {
        self.input_data.insert(key.into(), value.into());
    }

    pub fn add_output(&mut self, key: &str, value: impl Into<Object>) {
        self.output_data.insert(key.into(), value.into());
    }

    pub fn add_all_output(&mut self, output: HashMap<InlineStr, Object>) {
        self.output_data.extend(output);
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub fn set_failed(&mut self, status: TaskStatus, reason: impl Into<InlineStr>) {
        self.status = status;
        self.reason_for_incompletion = reason.into();
    }

    pub fn increment_poll_count(&mut self) {
        self.poll_count += 1;
    }
}

#[derive(Clone, Copy, Debug, EnumString, AsRefStr, PartialEq, Eq, Hash)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    InProgress,
    Canceled,
    Failed,
    FailedWithTerminalError,
    Completed,
    CompletedWithErrors,
    Scheduled,
    TimedOut,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::InProgress | TaskStatus::Scheduled)
    }

    pub fn is_successful(&self) -> bool {
        !matches!(
            self,
            TaskStatus::Canceled
                | TaskStatus::Failed
                | TaskStatus::FailedWithTerminalError
                | TaskStatus::TimedOut
        )
    }

    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            TaskStatus::Canceled | TaskStatus::FailedWithTerminalError | TaskStatus::Skipped
        )
    }
}

impl From<TaskResultStatus> for TaskStatus {
    fn from(status: TaskResultStatus) -> Self {
        match status {
            TaskResultStatus::InProgress => TaskStatus::InProgress,
            TaskResultStatus::Failed => TaskStatus::Failed,
            TaskResultStatus::FailedWithTerminalError => TaskStatus::FailedWithTerminalError,
            TaskResultStatus::Completed => TaskStatus::Completed,
        }
    }
}
