use regor_common::prelude::*;
use regor_common::TaskType;

use super::join::{join_backoff, join_on_refs};
use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::WorkflowExecutor;

/// Joins on the one branch of a DECISION/SWITCH that actually ran, falling back to the
/// `defaultExclusiveJoinTask` references when none of the `joinOn` tasks was scheduled.
pub struct ExclusiveJoin;

impl ExclusiveJoin {
    const DEFAULT_EXCLUSIVE_JOIN_TASKS: &'static str = "defaultExclusiveJoinTask";

    /// The first scheduled, non skipped task among `refs`.
    fn find<'a>(workflow: &'a WorkflowModel, refs: &[InlineStr]) -> RegorResult<Option<&'a TaskModel>> {
        for join_on_ref in refs {
            match workflow.get_task_by_ref_name(join_on_ref)? {
                Some(task) if task.status != TaskStatus::Skipped => return Ok(Some(task)),
                _ => continue,
            }
        }
        Ok(None)
    }
}

impl WorkflowSystemTask for ExclusiveJoin {
    fn task_type(&self) -> &str {
        TaskType::ExclusiveJoin.as_ref()
    }

    fn execute(
        &self,
        workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        let mut exclusive_task = Self::find(workflow, &join_on_refs(task, "joinOn"))?;
        if exclusive_task.is_none() {
            let default_tasks = join_on_refs(task, Self::DEFAULT_EXCLUSIVE_JOIN_TASKS);
            if default_tasks.is_empty() {
                // nothing to wait for
                task.set_status(TaskStatus::Completed);
                return Ok(true);
            }
            exclusive_task = Self::find(workflow, &default_tasks)?;
        }

        let exclusive_task = match exclusive_task {
            Some(exclusive_task) => exclusive_task,
            None => return Ok(false),
        };
        let task_status = exclusive_task.status;
        if !task_status.is_terminal() {
            return Ok(false);
        }

        if task_status.is_successful() || exclusive_task.is_optional() {
            task.output_data = exclusive_task.output_data.clone();
            task.set_status(TaskStatus::Completed);
        } else {
            let reason = exclusive_task.reason_for_incompletion.clone();
            task.set_failed(TaskStatus::Failed, reason);
        }
        debug!("Task: {} status is: {}", task.task_id, task.status.as_ref());
        Ok(true)
    }

    fn is_async(&self) -> bool {
        true
    }

    fn get_evaluation_offset(&self, task: &TaskModel, default_offset: i64) -> Option<i64> {
        Some(join_backoff(task.poll_count, default_offset))
    }
}
