use crate::model::{TaskModel, WorkflowModel};

/// Notified when a task changes status. Implementations must return quickly and never fail the
/// engine, so every hook has a no-op default.
pub trait TaskStatusListener: Send + Sync {
    fn on_task_scheduled(&self, _task: &TaskModel) {}

    fn on_task_in_progress(&self, _task: &TaskModel) {}

    fn on_task_canceled(&self, _task: &TaskModel) {}

    fn on_task_failed(&self, _task: &TaskModel) {}

    fn on_task_failed_with_terminal_error(&self, _task: &TaskModel) {}

    fn on_task_completed(&self, _task: &TaskModel) {}

    fn on_task_completed_with_errors(&self, _task: &TaskModel) {}

    fn on_task_timed_out(&self, _task: &TaskModel) {}

    fn on_task_skipped(&self, _task: &TaskModel) {}
}

/// Notified when a workflow starts or reaches a terminal status.
pub trait WorkflowStatusListener: Send + Sync {
    fn on_workflow_started(&self, _workflow: &WorkflowModel) {}

    fn on_workflow_completed(&self, _workflow: &WorkflowModel) {}

    fn on_workflow_terminated(&self, _workflow: &WorkflowModel) {}

    /// All non terminal tasks of the workflow were canceled, nothing will run anymore.
    fn on_workflow_finalized(&self, _workflow: &WorkflowModel) {}

    fn on_workflow_paused(&self, _workflow: &WorkflowModel) {}

    fn on_workflow_resumed(&self, _workflow: &WorkflowModel) {}

    fn on_workflow_restarted(&self, _workflow: &WorkflowModel) {}

    fn on_workflow_retried(&self, _workflow: &WorkflowModel) {}
}
