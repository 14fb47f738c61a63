use regor_common::prelude::*;

use crate::model::{TaskModel, WorkflowModel};
use crate::runtime::execution::WorkflowExecutor;

/// A task executed by the engine itself rather than by an external worker.
///
/// Synchronous tasks are started and executed inline by the decide loop, asynchronous ones are
/// queued under their task type and driven by the system task worker.
pub trait WorkflowSystemTask: Send + Sync {
    /// name of the system task, also the name of its queue
    fn task_type(&self) -> &str;

    /// Start the task execution.
    ///
    /// Called only once, and first, when the task status is SCHEDULED.
    fn start(
        &self,
        _workflow: &mut WorkflowModel,
        _task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        // Do nothing unless overridden by the task implementation
        Ok(())
    }

    /// "Execute" the task.
    ///
    /// Called after `start`, if the task status is not terminal. Can be called more than once.
    /// Returns true if the task state changed.
    fn execute(
        &self,
        _workflow: &mut WorkflowModel,
        _task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        Ok(false)
    }

    /// Cancel task execution
    fn cancel(
        &self,
        _workflow: &WorkflowModel,
        _task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        Ok(())
    }

    /// True if the task is supposed to be started asynchronously using internal queues.
    fn is_async(&self) -> bool {
        false
    }

    /// True to keep the task IN_PROGRESS, to be completed later by an external message.
    fn is_async_complete(&self, task: &TaskModel) -> bool {
        match task.input_data.get("asyncComplete") {
            Some(async_complete) => async_complete.as_bool().unwrap_or(false),
            None => task
                .workflow_task
                .as_ref()
                .map(|x| x.async_complete)
                .unwrap_or(false),
        }
    }

    /// The time, in seconds, after which the task should be evaluated again. `None` falls back
    /// to the default callback time.
    fn get_evaluation_offset(&self, _task: &TaskModel, _default_offset: i64) -> Option<i64> {
        None
    }
}
