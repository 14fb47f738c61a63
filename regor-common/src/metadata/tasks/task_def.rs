use std::str::FromStr;

use serde::Serialize;
use strum_macros::{AsRefStr, EnumString};

use crate::metadata::JsonExt;
use crate::prelude::*;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDef {
    /// Task Name. Unique name of the Task that resonates with its function.
    pub name: InlineStr,
    pub description: InlineStr,
    /// Number of retries to attempt when a Task is marked as failure.
    /// Defaults to 3 with maximum allowed capped at 10
    pub retry_count: i32,
    pub retry_logic: RetryLogic,
    /// Time to wait before retries, defaults to 60 seconds
    pub retry_delay_seconds: i32,
    /// Defaults to TIME_OUT_WF
    pub timeout_policy: TimeoutPolicy,
    /// Time in seconds, after which the task is marked as TIMED_OUT if not completed after
    /// transitioning to IN_PROGRESS status for the first time. No timeouts if set to 0
    pub timeout_seconds: i32,
    /// If greater than 0, the task is rescheduled if not updated with a status after this time
    /// (heartbeat mechanism). Defaults to 3600
    pub response_timeout_seconds: i32,
    /// Time in seconds, after which the task is marked as TIMED_OUT if not polled by a worker.
    /// No timeouts if set to 0
    pub poll_timeout_seconds: i32,
    pub input_keys: Vec<InlineStr>,
    pub output_keys: Vec<InlineStr>,
    /// Default input values, merged under the resolved task input.
    pub input_template: HashMap<InlineStr, Object>,
    /// Number of tasks that can be executed at any given time
    pub concurrent_exec_limit: Option<i32>,
    pub rate_limit_frequency_in_seconds: Option<i32>,
    /// Max number of tasks that can be given to workers within the frequency window
    pub rate_limit_per_frequency: Option<i32>,
    pub owner_app: InlineStr,
    pub owner_email: InlineStr,

    pub isolation_group_id: InlineStr,
    pub execution_name_space: InlineStr,
    /// Applicable for LINEAR_BACKOFF
    pub backoff_scale_factor: i32,

    pub created_by: InlineStr,
    pub create_time: i64,
    pub updated_by: InlineStr,
    pub update_time: i64,
}

impl TaskDef {
    pub const ONE_HOUR_SECS: i32 = 3600;

    pub fn new(name: &str) -> Self {
        Self {
            name: InlineStr::from(name),
            description: InlineStr::new(),
            retry_count: 3,
            retry_logic: RetryLogic::Fixed,
            retry_delay_seconds: 60,
            timeout_policy: TimeoutPolicy::TimeOutWf,
            timeout_seconds: 0,
            response_timeout_seconds: Self::ONE_HOUR_SECS,
            poll_timeout_seconds: 0,
            input_keys: Vec::default(),
            output_keys: Vec::default(),
            input_template: HashMap::default(),
            concurrent_exec_limit: None,
            rate_limit_frequency_in_seconds: None,
            rate_limit_per_frequency: None,
            owner_app: InlineStr::new(),
            owner_email: InlineStr::new(),
            isolation_group_id: InlineStr::new(),
            execution_name_space: InlineStr::new(),
            backoff_scale_factor: 1,
            created_by: InlineStr::new(),
            create_time: 0,
            updated_by: InlineStr::new(),
            update_time: 0,
        }
    }

    pub fn concurrency_limit(&self) -> i32 {
        self.concurrent_exec_limit.unwrap_or(0)
    }

    pub fn rate_limit_per_frequency(&self) -> i32 {
        self.rate_limit_per_frequency.unwrap_or(0)
    }

    pub fn rate_limit_frequency_in_seconds(&self) -> i32 {
        self.rate_limit_frequency_in_seconds.unwrap_or(1)
    }

    pub fn get_response_timeout_seconds(&self) -> i32 {
        if self.response_timeout_seconds == 0 {
            if self.timeout_seconds == 0 {
                Self::ONE_HOUR_SECS
            } else {
                self.timeout_seconds
            }
        } else {
            self.response_timeout_seconds
        }
    }

    pub fn validate(&self) -> RegorResult<()> {
        if self.name.is_empty() {
            return str_err!(IllegalArgument, "TaskDef name cannot be null or empty");
        }
        if self.timeout_seconds > 0
            && self.response_timeout_seconds > 0
            && self.response_timeout_seconds > self.timeout_seconds
        {
            return fmt_err!(
                IllegalArgument,
                "TaskDef: {} responseTimeoutSeconds: {} must be less than timeoutSeconds: {}",
                self.name,
                self.response_timeout_seconds,
                self.timeout_seconds
            );
        }
        Ok(())
    }
}

impl TryFrom<&serde_json::Value> for TaskDef {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        let retry_count = value.i32_or("retryCount", 3)?;
        if !(0..=10).contains(&retry_count) {
            return str_err!(IllegalArgument, "retryCount must in range [0..=10]");
        }

        let task_def = Self {
            name: value.required_str("name")?,
            description: value.str_or("description", "")?,
            retry_count,
            retry_logic: RetryLogic::from_str(value.str_or("retryLogic", "FIXED")?.as_str())
                .map_err(|_| ErrorCode::IllegalArgument("retryLogic invalid"))?,
            retry_delay_seconds: value.i32_or("retryDelaySeconds", 60)?,
            timeout_policy: TimeoutPolicy::from_str(
                value.str_or("timeoutPolicy", "TIME_OUT_WF")?.as_str(),
            )
            .map_err(|_| ErrorCode::IllegalArgument("timeoutPolicy invalid"))?,
            timeout_seconds: value.i32_or("timeoutSeconds", 0)?,
            response_timeout_seconds: value
                .i32_or("responseTimeoutSeconds", Self::ONE_HOUR_SECS)?,
            poll_timeout_seconds: value.i32_or("pollTimeoutSeconds", 0)?.max(0),
            input_keys: value.str_list("inputKeys")?,
            output_keys: value.str_list("outputKeys")?,
            input_template: value.object_map("inputTemplate")?,
            concurrent_exec_limit: value.optional_i32("concurrentExecLimit")?,
            rate_limit_frequency_in_seconds: value.optional_i32("rateLimitFrequencyInSeconds")?,
            rate_limit_per_frequency: value.optional_i32("rateLimitPerFrequency")?,
            owner_app: value.str_or("ownerApp", "")?,
            owner_email: value.str_or("ownerEmail", "")?,
            isolation_group_id: value.str_or("isolationGroupId", "")?,
            execution_name_space: value.str_or("executionNameSpace", "")?,
            backoff_scale_factor: value.i32_or("backoffScaleFactor", 1)?.max(1),
            created_by: value.str_or("createdBy", "")?,
            create_time: 0,
            updated_by: InlineStr::default(),
            update_time: 0,
        };
        task_def.validate()?;
        Ok(task_def)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, EnumString, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeoutPolicy {
    /// Retries the task again
    Retry,
    /// Workflow is marked as TIMED_OUT and terminated. This is the default value.
    TimeOutWf,
    /// Registers a counter (task_timeout)
    AlertOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, EnumString, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryLogic {
    /// Reschedule the task after retry_delay_seconds
    Fixed,
    /// Reschedule the task after retry_delay_seconds * (2 ^ attempt_number)
    ExponentialBackoff,
    /// Reschedule after retry_delay_seconds * backoff_rate * attempt_number
    LinearBackoff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_timeout_must_not_exceed_timeout() {
        let json = serde_json::json!({
            "name": "encode",
            "timeoutSeconds": 10,
            "responseTimeoutSeconds": 20
        });
        let err = TaskDef::try_from(&json).unwrap_err();
        assert_eq!(err.code(), ErrorCode::illegal_argument_code());

        let json = serde_json::json!({
            "name": "encode",
            "retryLogic": "LINEAR_BACKOFF",
            "backoffScaleFactor": 2,
            "timeoutSeconds": 0,
            "responseTimeoutSeconds": 20
        });
        let def = TaskDef::try_from(&json).unwrap();
        assert_eq!(def.retry_logic, RetryLogic::LinearBackoff);
        assert_eq!(def.backoff_scale_factor, 2);
        assert_eq!(def.retry_count, 3);
    }
}
