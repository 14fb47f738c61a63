use regor_common::prelude::*;
use serde::Deserialize;

/// Engine tunables. Every field has a default, so a partial json document is enough to
/// override a few of them.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Properties {
    /// The timeout duration to set when a workflow is pushed to the decider queue.
    pub workflow_offset_timeout_secs: i64,
    /// The time to postpone a task whose concurrency or rate limit is exceeded.
    pub task_execution_postpone_secs: i64,
    /// The delay before an asynchronous system task is polled again.
    pub system_task_callback_time_secs: i64,
    pub system_task_worker_thread_count: usize,
    pub system_task_max_poll_count: usize,
    pub system_task_worker_poll_interval_ms: u64,
    pub system_task_queue_pop_timeout_ms: u64,
    pub sweeper_thread_count: usize,
    pub sweeper_workflow_poll_timeout_ms: u64,
    pub sweep_disabled: bool,
    /// Re-enqueue tasks and workflows whose queue message was lost, before each sweep.
    pub workflow_repair_service_enabled: bool,
    pub lock_time_to_try_ms: u64,
    pub lock_lease_time_ms: u64,
    pub enable_workflow_execution_lock: bool,
    /// Tasks pending longer than this are reported by the metrics.
    pub task_pending_time_threshold_secs: i64,
    /// Beyond this size the SET_VARIABLE change is rejected and the task fails terminally.
    pub max_workflow_variables_payload_size_threshold_kb: usize,

    pub event_processor_thread_count: usize,
    pub event_queue_poll_interval_ms: u64,
    /// Messages taken from an event queue per poll.
    pub event_queue_poll_count: usize,
    /// Polls the isolated queues of the asynchronous system tasks, derived from the task
    /// definitions with an isolation group or an execution namespace.
    pub isolated_system_task_enabled: bool,
    pub isolated_system_task_queue_poll_interval_secs: u64,

    pub workflow_input_payload_size_threshold_kb: usize,
    pub max_workflow_input_payload_size_threshold_kb: usize,
    pub workflow_output_payload_size_threshold_kb: usize,
    pub max_workflow_output_payload_size_threshold_kb: usize,
    pub task_input_payload_size_threshold_kb: usize,
    pub max_task_input_payload_size_threshold_kb: usize,
    pub task_output_payload_size_threshold_kb: usize,
    pub max_task_output_payload_size_threshold_kb: usize,

    pub app_id: InlineStr,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            workflow_offset_timeout_secs: 30,
            task_execution_postpone_secs: 60,
            system_task_callback_time_secs: 30,
            system_task_worker_thread_count: 10,
            system_task_max_poll_count: 1,
            system_task_worker_poll_interval_ms: 50,
            system_task_queue_pop_timeout_ms: 200,
            sweeper_thread_count: 5,
            sweeper_workflow_poll_timeout_ms: 2000,
            sweep_disabled: false,
            workflow_repair_service_enabled: false,
            lock_time_to_try_ms: 500,
            lock_lease_time_ms: 60000,
            enable_workflow_execution_lock: true,
            task_pending_time_threshold_secs: 60 * 60,
            max_workflow_variables_payload_size_threshold_kb: 256,

            event_processor_thread_count: 2,
            event_queue_poll_interval_ms: 100,
            event_queue_poll_count: 10,
            isolated_system_task_enabled: false,
            isolated_system_task_queue_poll_interval_secs: 10,

            workflow_input_payload_size_threshold_kb: 5 * 1024,
            max_workflow_input_payload_size_threshold_kb: 10 * 1024,
            workflow_output_payload_size_threshold_kb: 5 * 1024,
            max_workflow_output_payload_size_threshold_kb: 10 * 1024,
            task_input_payload_size_threshold_kb: 3 * 1024,
            max_task_input_payload_size_threshold_kb: 10 * 1024,
            task_output_payload_size_threshold_kb: 3 * 1024,
            max_task_output_payload_size_threshold_kb: 10 * 1024,

            app_id: "regor".into(),
        }
    }
}

impl Properties {
    pub fn from_json(json: &str) -> RegorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::Properties;

    #[test]
    fn partial_json_keeps_defaults() {
        let properties =
            Properties::from_json(r#"{"sweep_disabled": true, "lock_time_to_try_ms": 10}"#)
                .unwrap();
        assert!(properties.sweep_disabled);
        assert_eq!(properties.lock_time_to_try_ms, 10);
        assert_eq!(properties.workflow_offset_timeout_secs, 30);
        assert_eq!(properties.system_task_worker_thread_count, 10);
    }
}
