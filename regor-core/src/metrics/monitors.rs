use regor_common::prelude::*;

use crate::external::{Operation, PayloadType};
use crate::model::{TaskStatus, WorkflowStatus};

const METRICS_TARGET: &str = "regor::metrics";

/// Engine metrics. No backend is bundled: every metric is a `debug` record on the
/// `regor::metrics` target with a stable name and its tags, for a log pipeline to pick up.
pub struct Monitors;

macro_rules! counter {
    ($name:expr $(, $tag:ident = $value:expr)*) => {
        debug!(target: METRICS_TARGET, "counter {} {}", $name, tags!($($tag = $value),*))
    };
}

macro_rules! gauge {
    ($name:expr, $gauge:expr $(, $tag:ident = $value:expr)*) => {
        debug!(target: METRICS_TARGET, "gauge {}={} {}", $name, $gauge, tags!($($tag = $value),*))
    };
}

macro_rules! timer {
    ($name:expr, $millis:expr $(, $tag:ident = $value:expr)*) => {
        debug!(target: METRICS_TARGET, "timer {}={}ms {}", $name, $millis, tags!($($tag = $value),*))
    };
}

macro_rules! tags {
    ($($tag:ident = $value:expr),*) => {{
        let tags: Vec<String> = vec![$(format!("{}={}", stringify!($tag), $value)),*];
        tags.join(",")
    }};
}

impl Monitors {
    pub fn error(class_name: &str, method_name: &str) {
        counter!("regor_server_error", class = class_name, method = method_name);
    }

    pub fn record_workflow_decision_time(duration: i64) {
        timer!("workflow_decision", duration);
    }

    pub fn record_workflow_completion(workflow_type: &str, duration: i64, owner_app: &str) {
        timer!(
            "workflow_execution",
            duration,
            workflow_name = workflow_type,
            owner_app = owner_app
        );
    }

    pub fn record_workflow_termination(
        workflow_type: &str,
        status: WorkflowStatus,
        owner_app: &str,
    ) {
        counter!(
            "workflow_failure",
            workflow_name = workflow_type,
            status = status.as_ref(),
            owner_app = owner_app
        );
    }

    pub fn record_workflow_start_success(workflow_type: &str, version: &str, owner_app: &str) {
        counter!(
            "workflow_start_success",
            workflow_name = workflow_type,
            version = version,
            owner_app = owner_app
        );
    }

    pub fn record_workflow_start_error(workflow_type: &str, owner_app: &str) {
        counter!(
            "workflow_start_error",
            workflow_name = workflow_type,
            owner_app = owner_app
        );
    }

    pub fn record_update_conflict(task_type: &str, workflow_type: &str, status: TaskStatus) {
        counter!(
            "task_update_conflict",
            workflow_name = workflow_type,
            task_type = task_type,
            status = status.as_ref()
        );
    }

    pub fn record_workflow_update_conflict(workflow_type: &str, status: WorkflowStatus) {
        counter!(
            "task_update_conflict",
            workflow_name = workflow_type,
            workflow_status = status.as_ref()
        );
    }

    pub fn record_task_queue_op_error(task_type: &str, workflow_type: &str) {
        counter!(
            "task_queue_op_error",
            task_type = task_type,
            workflow_type = workflow_type
        );
    }

    pub fn record_task_update_error(task_type: &str, workflow_type: &str) {
        counter!(
            "task_update_error",
            task_type = task_type,
            workflow_type = workflow_type
        );
    }

    pub fn record_task_execution_time(
        task_type: &str,
        duration: i64,
        includes_retries: bool,
        status: TaskStatus,
    ) {
        timer!(
            "task_execution",
            duration,
            task_type = task_type,
            include_retries = includes_retries,
            status = status.as_ref()
        );
    }

    pub fn record_task_extend_lease_error(task_type: &str, workflow_type: &str) {
        counter!(
            "task_extend_lease_error",
            task_type = task_type,
            workflow_type = workflow_type
        );
    }

    pub fn record_num_tasks_in_workflow(count: usize, name: &str, version: i32) {
        gauge!(
            "tasks_in_workflow",
            count,
            workflow_name = name,
            version = version
        );
    }

    pub fn record_acquire_lock_unsuccessful() {
        counter!("acquire_lock_unsuccessful");
    }

    pub fn record_acquire_lock_failure(exception_class_name: &str) {
        counter!("acquire_lock_failure", exception = exception_class_name);
    }

    pub fn record_task_poll_error(task_type: &str, exception: &str) {
        counter!(
            "task_poll_error",
            task_type = task_type,
            exception = exception
        );
    }

    pub fn record_task_poll_count(task_type: &str, count: usize) {
        gauge!("task_poll_count", count, task_type = task_type);
    }

    pub fn record_task_response_timeout(task_type: &str) {
        counter!("task_response_timeout", task_type = task_type);
    }

    pub fn record_task_timeout(task_type: &str) {
        counter!("task_timeout", task_type = task_type);
    }

    pub fn record_workflow_timeout(workflow_type: &str) {
        counter!("workflow_timeout", workflow_name = workflow_type);
    }

    pub fn record_task_pending_time(task_type: &str, workflow_type: &str, duration: i64) {
        gauge!(
            "task_pending_time",
            duration,
            workflow_name = workflow_type,
            task_type = task_type
        );
    }

    pub fn record_queue_wait_time(task_type: &str, queue_wait_time: i64) {
        timer!("task_queue_wait", queue_wait_time, task_type = task_type);
    }

    pub fn record_task_concurrent_execution_limited(task_def_name: &str, limit: i32) {
        gauge!(
            "task_concurrent_execution_limited",
            limit,
            task_type = task_def_name
        );
    }

    pub fn record_task_rate_limited(task_def_name: &str, limit: i32) {
        gauge!("task_rate_limited", limit, task_type = task_def_name);
    }

    pub fn record_event_queue_messages_processed(queue_name: &str, count: usize) {
        counter!(
            "event_queue_messages_processed",
            queue_name = queue_name,
            count = count
        );
    }

    pub fn record_event_queue_messages_handled(queue_name: &str) {
        counter!("event_queue_messages_handled", queue_name = queue_name);
    }

    pub fn record_event_queue_messages_error(queue_name: &str) {
        counter!("event_queue_messages_error", queue_name = queue_name);
    }

    pub fn record_event_execution_success(event: &str, handler: &str, action: &str) {
        counter!(
            "event_execution_success",
            event = event,
            handler = handler,
            action = action
        );
    }

    pub fn record_event_execution_error(event: &str, handler: &str, action: &str, error: &str) {
        counter!(
            "event_execution_error",
            event = event,
            handler = handler,
            action = action,
            exception = error
        );
    }

    pub fn record_event_queue_depth(queue_name: &str, size: usize) {
        gauge!("event_queue_depth", size, queue_name = queue_name);
    }

    pub fn record_external_payload_storage_usage(
        name: &str,
        operation: Operation,
        payload_type: PayloadType,
    ) {
        counter!(
            "external_payload_storage_usage",
            name = name,
            operation = operation.as_ref(),
            payload_type = payload_type.as_ref()
        );
    }

    pub fn record_workflow_repaired(queue_name: &str) {
        counter!("queue_repair", queue_name = queue_name);
    }

    pub fn record_system_task_worker_polling_limited(queue_name: &str) {
        counter!("system_task_worker_polling_limited", queue_name = queue_name);
    }

    pub fn record_workflow_sweep_error(workflow_id: &str) {
        counter!("workflow_sweep_error", workflow_id = workflow_id);
    }

    pub fn record_unack_timeout(unack_timeout_ms: i64) {
        gauge!("workflow_unack_timeout", unack_timeout_ms);
    }
}
