use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::WorkflowExecutor;
use crate::utils::DateTimeUtils;

/// Waits either for a `duration`, until a point in time given by `until`, or, with neither, for
/// an external update.
pub struct Wait;

impl Wait {
    pub const DURATION_INPUT: &'static str = "duration";
    pub const UNTIL_INPUT: &'static str = "until";

    fn input_str<'a>(task: &'a TaskModel, key: &str) -> Option<&'a str> {
        task.input_data
            .get(key)
            .and_then(|x| x.as_string().ok())
            .map(|x| x.trim())
            .filter(|x| !x.is_empty())
    }
}

impl WorkflowSystemTask for Wait {
    fn task_type(&self) -> &str {
        TaskType::Wait.as_ref()
    }

    fn start(
        &self,
        _workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        let duration = Self::input_str(task, Self::DURATION_INPUT).map(InlineStr::from);
        let until = Self::input_str(task, Self::UNTIL_INPUT).map(InlineStr::from);
        let now = Utc::now().timestamp_millis();

        let wait_timeout = match (duration, until) {
            (Some(_), Some(_)) => {
                task.set_failed(
                    TaskStatus::FailedWithTerminalError,
                    "Both 'duration' and 'until' specified. Please provide only one input",
                );
                return Ok(());
            }
            (Some(duration), None) => {
                DateTimeUtils::parse_duration(&duration).map(|secs| now + secs * 1000)
            }
            (None, Some(until)) => DateTimeUtils::parse_date(&until),
            (None, None) => Ok(0),
        };

        match wait_timeout {
            Ok(wait_timeout) => {
                task.wait_timeout = wait_timeout;
                if wait_timeout > 0 {
                    task.callback_after_seconds = ((wait_timeout - now) / 1000).max(0);
                }
                task.set_status(TaskStatus::InProgress);
            }
            Err(e) => task.set_failed(TaskStatus::FailedWithTerminalError, e.display_text()),
        }
        Ok(())
    }

    fn execute(
        &self,
        _workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        if task.status.is_terminal() || task.wait_timeout == 0 {
            return Ok(false);
        }
        if Utc::now().timestamp_millis() >= task.wait_timeout {
            task.set_status(TaskStatus::Completed);
            return Ok(true);
        }
        Ok(false)
    }
}

/// Stays IN_PROGRESS until a person completes it through `update_task`.
pub struct Human;

impl WorkflowSystemTask for Human {
    fn task_type(&self) -> &str {
        TaskType::Human.as_ref()
    }

    fn start(
        &self,
        _workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        task.set_status(TaskStatus::InProgress);
        Ok(())
    }
}
