use regor_common::prelude::*;
use regor_common::{TaskType, TaskUtils};

use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::WorkflowExecutor;

/// Waits for the tasks named by `joinOn` and completes once all of them are terminal.
pub struct Join;

impl WorkflowSystemTask for Join {
    fn task_type(&self) -> &str {
        TaskType::Join.as_ref()
    }

    fn execute(
        &self,
        workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        let mut failure_reason = String::new();
        let mut all_tasks_terminal = true;
        let mut has_failures = false;
        let mut optional_failures = false;

        for join_on_ref in join_on_refs(task, "joinOn") {
            let forked_task = match workflow.get_task_by_ref_name(&join_on_ref)? {
                Some(forked_task) => forked_task,
                None => {
                    // Task is not even scheduled yet
                    all_tasks_terminal = false;
                    break;
                }
            };

            let task_status = forked_task.status;
            if !task_status.is_successful() || task_status == TaskStatus::CompletedWithErrors {
                if forked_task.is_optional() {
                    optional_failures |= task_status.is_terminal();
                } else {
                    has_failures = true;
                    failure_reason.push_str(&forked_task.reason_for_incompletion);
                    failure_reason.push(' ');
                }
            }
            // Only add to task output if it's not empty
            if !forked_task.output_data.is_empty() {
                let output = forked_task.output_data.clone();
                task.add_output(&join_on_ref, output);
            }
            if !task_status.is_terminal() {
                all_tasks_terminal = false;
            }
            if has_failures {
                break;
            }
        }

        if has_failures {
            task.set_failed(TaskStatus::Failed, failure_reason.trim_end());
            return Ok(true);
        }
        if all_tasks_terminal {
            if optional_failures {
                task.set_status(TaskStatus::CompletedWithErrors);
            } else {
                task.set_status(TaskStatus::Completed);
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn is_async(&self) -> bool {
        true
    }

    fn get_evaluation_offset(&self, task: &TaskModel, default_offset: i64) -> Option<i64> {
        Some(join_backoff(task.poll_count, default_offset))
    }
}

/// The reference names listed under `key`, suffixed with the iteration inside a loop body.
pub(super) fn join_on_refs(task: &TaskModel, key: &str) -> Vec<InlineStr> {
    let refs = task
        .input_data
        .get(key)
        .and_then(|x| x.as_list())
        .map(|list| list.iter().map(|x| x.to_string()).collect::<Vec<_>>())
        .unwrap_or_default();

    if task.is_loop_over_task() {
        // If join is part of loop over task, wait for specific iteration to get complete
        refs.into_iter()
            .map(|x| TaskUtils::get_loop_over_task_ref_name(&x, task.iteration))
            .collect()
    } else {
        refs
    }
}

/// `min(2^(pollCount-1), offset)` seconds.
pub(super) fn join_backoff(poll_count: i32, offset: i64) -> i64 {
    let exponent = (poll_count - 1).clamp(0, 62) as u32;
    2_i64.pow(exponent).min(offset)
}

#[cfg(test)]
mod tests {
    use super::join_backoff;

    #[test]
    fn backoff_is_capped_by_offset() {
        assert_eq!(join_backoff(0, 30), 1);
        assert_eq!(join_backoff(1, 30), 1);
        assert_eq!(join_backoff(3, 30), 4);
        assert_eq!(join_backoff(6, 30), 30);
        assert_eq!(join_backoff(100, 30), 30);
    }
}
