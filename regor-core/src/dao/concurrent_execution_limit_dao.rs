use crate::model::TaskModel;

/// Support concurrency limits of tasks.
pub trait ConcurrentExecutionLimitDao: Send + Sync {
    /// Checks if the number of tasks in progress for the given task definition will exceed the
    /// limit if the task is scheduled to be in progress (given to the worker or for system tasks
    /// `start` called).
    ///
    /// Returns true if by executing this task the limit is breached.
    fn exceeds_limit(&self, task: &TaskModel) -> bool;
}
