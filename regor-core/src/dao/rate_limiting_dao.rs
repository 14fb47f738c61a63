use regor_common::TaskDef;

use crate::model::TaskModel;

/// Rate limiting of task executions within a sliding time window.
pub trait RateLimitingDao: Send + Sync {
    /// Checks if the task is rate limited, based on the limits of `task_def` when given, else on
    /// `TaskModel::rate_limit_per_frequency` and `TaskModel::rate_limit_frequency_in_seconds`.
    ///
    /// Returns true if the task must not run in the current window.
    fn exceeds_rate_limit_per_frequency(&self, task: &TaskModel, task_def: Option<&TaskDef>)
        -> bool;
}
