use crate::prelude::*;

/// A log line a worker attaches to a task update.
#[derive(Clone, Debug)]
pub struct TaskExecLog {
    pub log: InlineStr,
    pub task_id: InlineStr,
    pub created_time: i64,
}

impl TaskExecLog {
    pub fn new(log: &str, task_id: &str, created_time: i64) -> Self {
        Self {
            log: log.into(),
            task_id: task_id.into(),
            created_time,
        }
    }
}
