use strum_macros::{AsRefStr, EnumString};

use super::task_exec_log::TaskExecLog;
use crate::prelude::*;

/// Result of the task execution, reported by a worker or by an external completion of an
/// async-complete system task.
#[derive(Clone, Debug)]
pub struct TaskResult {
    pub workflow_instance_id: InlineStr,
    pub task_id: InlineStr,
    pub reason_for_incompletion: InlineStr,
    pub callback_after_seconds: i64,
    pub worker_id: InlineStr,
    pub status: TaskResultStatus,
    pub output_data: HashMap<InlineStr, Object>,
    pub logs: Vec<TaskExecLog>,
    pub external_output_payload_storage_path: InlineStr,
    pub sub_workflow_id: InlineStr,
    /// Keep an IN_PROGRESS task alive: its update time is refreshed so the response timeout
    /// starts over.
    pub extend_lease: bool,
}

impl TaskResult {
    pub fn new(workflow_instance_id: &str, task_id: &str, status: TaskResultStatus) -> Self {
        Self {
            workflow_instance_id: workflow_instance_id.into(),
            task_id: task_id.into(),
            reason_for_incompletion: InlineStr::default(),
            callback_after_seconds: 0,
            worker_id: InlineStr::default(),
            status,
            output_data: HashMap::default(),
            logs: Vec::default(),
            external_output_payload_storage_path: InlineStr::default(),
            sub_workflow_id: InlineStr::default(),
            extend_lease: false,
        }
    }

    pub fn with_output(mut self, output_data: HashMap<InlineStr, Object>) -> Self {
        self.output_data = output_data;
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason_for_incompletion = reason.into();
        self
    }

    pub fn log(&mut self, log: &str) {
        self.logs.push(TaskExecLog::new(
            log,
            &self.task_id,
            chrono::Utc::now().timestamp_millis(),
        ));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskResultStatus {
    InProgress,
    Failed,
    FailedWithTerminalError,
    Completed,
}
