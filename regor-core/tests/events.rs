mod common;

use regor_common::prelude::*;
use regor_common::EventHandler;
use regor_core::{
    Engine, EventExecutionStatus, EventQueues, Message, QueueUtils, TaskStatus, WorkflowStatus,
};
use serde_json::json;

const NOTIFY_WORKFLOW: &str = r#"
{
    "name": "notify_workflow",
    "version": 1,
    "tasks": [
        {
            "name": "notify",
            "taskReferenceName": "notify_ref",
            "inputParameters": {
                "orderId": "${workflow.input.orderId}"
            },
            "type": "EVENT",
            "sink": "regor"
        },
        {
            "name": "wait_for_ack",
            "taskReferenceName": "wait_ref",
            "type": "WAIT"
        }
    ]
}"#;

const ORDER_WORKFLOW: &str = r#"
{
    "name": "order_workflow",
    "version": 1,
    "tasks": [
        {
            "name": "pack_order",
            "taskReferenceName": "pack_ref",
            "inputParameters": {
                "orderId": "${workflow.input.orderId}"
            },
            "type": "SIMPLE"
        }
    ]
}"#;

const NOTIFY_QUEUE: &str = "regor:notify_workflow:notify_ref";

fn add_handler(engine: &Engine, value: serde_json::Value) {
    let handler = EventHandler::try_from(&value).expect("parse EventHandler failed");
    engine
        .metadata()
        .add_event_handler(handler)
        .expect("add_event_handler failed");
}

fn poll_events(engine: &Engine) -> usize {
    engine
        .event_queue_manager()
        .expect("event queues are configured")
        .poll_once()
}

#[test]
fn event_task_message_completes_the_waiting_task() {
    let (engine, queues) = common::engine_with_event_queues();
    common::register_workflow(&engine, NOTIFY_WORKFLOW);
    add_handler(
        &engine,
        json!({
            "name": "ack_notification",
            "event": NOTIFY_QUEUE,
            "active": true,
            "actions": [{
                "action": "complete_task",
                "complete_task": {
                    "workflowId": "${workflowInstanceId}",
                    "taskRefName": "wait_ref",
                    "output": {"order": "${orderId}"}
                }
            }]
        }),
    );

    let workflow_id = common::start(&engine, "notify_workflow", object_map! {"orderId" => "o-7"});
    let notify = common::run_until_terminal(&engine, &workflow_id, "notify_ref");
    assert_eq!(notify.status, TaskStatus::Completed);
    assert_eq!(queues.size(NOTIFY_QUEUE).unwrap(), 1);

    let wait = common::task_by_ref(&engine, &workflow_id, "wait_ref");
    assert_eq!(wait.status, TaskStatus::InProgress);

    assert_eq!(poll_events(&engine), 1);

    let wait = common::task_by_ref(&engine, &workflow_id, "wait_ref");
    assert_eq!(wait.status, TaskStatus::Completed);
    assert_eq!(wait.output_data.get("order"), Some(&Object::from("o-7")));
    assert_eq!(
        wait.output_data.get("regor.event.messageId"),
        Some(&Object::from(&notify.task_id))
    );
    assert_eq!(
        common::workflow(&engine, &workflow_id).status,
        WorkflowStatus::Completed
    );
    assert!(queues.messages(NOTIFY_QUEUE).is_empty());

    let executions = engine
        .executor()
        .execution_dao_facade()
        .get_event_executions("ack_notification", NOTIFY_QUEUE, Some(&notify.task_id))
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, EventExecutionStatus::Completed);
    assert_eq!(executions[0].id, format!("{}_0", notify.task_id).as_str());
    assert_eq!(
        executions[0].output.get("taskRefName"),
        Some(&Object::from("wait_ref"))
    );
}

#[test]
fn fail_task_action_fails_the_waiting_task() {
    let (engine, _queues) = common::engine_with_event_queues();
    common::register_workflow(&engine, NOTIFY_WORKFLOW);
    add_handler(
        &engine,
        json!({
            "name": "reject_notification",
            "event": NOTIFY_QUEUE,
            "active": true,
            "actions": [{
                "action": "fail_task",
                "fail_task": {
                    "workflowId": "${workflowInstanceId}",
                    "taskRefName": "wait_ref"
                }
            }]
        }),
    );

    let workflow_id = common::start(&engine, "notify_workflow", object_map! {"orderId" => "o-8"});
    common::run_until_terminal(&engine, &workflow_id, "notify_ref");
    poll_events(&engine);

    let wait = common::task_by_ref(&engine, &workflow_id, "wait_ref");
    // no attempts left for WAIT, the workflow moves on past it
    assert_eq!(wait.status, TaskStatus::CompletedWithErrors);
    assert_eq!(
        wait.reason_for_incompletion,
        format!("Failed by the event {}", NOTIFY_QUEUE).as_str()
    );
    assert!(common::workflow(&engine, &workflow_id)
        .failed_reference_task_names
        .contains("wait_ref"));
}

#[test]
fn start_workflow_action_runs_once_per_message() {
    let (engine, queues) = common::engine_with_event_queues();
    common::register_simple_tasks(&engine, &["pack_order"]);
    common::register_workflow(&engine, ORDER_WORKFLOW);
    add_handler(
        &engine,
        json!({
            "name": "start_order",
            "event": "orders",
            "active": true,
            "actions": [{
                "action": "start_workflow",
                "start_workflow": {
                    "name": "order_workflow",
                    "correlationId": "${orderId}",
                    "input": {"orderId": "${orderId}"}
                }
            }]
        }),
    );

    queues
        .publish("orders", vec![Message::new("m-1", json!({"orderId": "o-1"}))])
        .unwrap();
    assert_eq!(poll_events(&engine), 1);

    let executions = engine
        .executor()
        .execution_dao_facade()
        .get_event_executions("start_order", "orders", Some("m-1"))
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, EventExecutionStatus::Completed);
    let started = executions[0]
        .output
        .get("workflowId")
        .and_then(|x| x.as_string().ok())
        .cloned()
        .expect("workflowId in the execution output");

    let workflow = common::workflow(&engine, &started);
    assert_eq!(workflow.correlation_id, "o-1");
    assert_eq!(workflow.input.get("orderId"), Some(&Object::from("o-1")));
    assert_eq!(
        workflow.input.get("regor.event.messageId"),
        Some(&Object::from("m-1"))
    );
    assert_eq!(workflow.event, "orders");
    let pack = common::task_by_ref(&engine, &started, "pack_ref");
    assert_eq!(pack.input_data.get("orderId"), Some(&Object::from("o-1")));

    // a redelivered message is recognised and acked without running again
    queues
        .publish("orders", vec![Message::new("m-1", json!({"orderId": "o-1"}))])
        .unwrap();
    assert_eq!(poll_events(&engine), 1);
    assert!(queues.messages("orders").is_empty());
    assert_eq!(
        engine
            .executor()
            .execution_dao_facade()
            .get_running_workflow_ids("order_workflow")
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn unmet_condition_skips_the_actions() {
    let (engine, queues) = common::engine_with_event_queues();
    common::register_simple_tasks(&engine, &["pack_order"]);
    common::register_workflow(&engine, ORDER_WORKFLOW);
    add_handler(
        &engine,
        json!({
            "name": "start_priority_order",
            "event": "orders",
            "condition": "$.priority == 'high'",
            "active": true,
            "actions": [{
                "action": "start_workflow",
                "start_workflow": {"name": "order_workflow", "input": {"orderId": "${orderId}"}}
            }]
        }),
    );

    queues
        .publish(
            "orders",
            vec![Message::new("m-2", json!({"orderId": "o-2", "priority": "low"}))],
        )
        .unwrap();
    poll_events(&engine);

    let executions = engine
        .executor()
        .execution_dao_facade()
        .get_event_executions("start_priority_order", "orders", None)
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, EventExecutionStatus::Skipped);
    assert_eq!(executions[0].id, "m-2_0");
    assert!(queues.messages("orders").is_empty());
    assert!(engine
        .executor()
        .execution_dao_facade()
        .get_running_workflow_ids("order_workflow")
        .unwrap()
        .is_empty());

    queues
        .publish(
            "orders",
            vec![Message::new("m-3", json!({"orderId": "o-3", "priority": "high"}))],
        )
        .unwrap();
    poll_events(&engine);
    let executions = engine
        .executor()
        .execution_dao_facade()
        .get_event_executions("start_priority_order", "orders", Some("m-3"))
        .unwrap();
    assert_eq!(executions[0].status, EventExecutionStatus::Completed);
}

#[test]
fn only_active_handlers_are_listened_to() {
    let (engine, _queues) = common::engine_with_event_queues();
    add_handler(
        &engine,
        json!({
            "name": "dormant",
            "event": "dormant_queue",
            "active": false,
            "actions": [{
                "action": "start_workflow",
                "start_workflow": {"name": "order_workflow"}
            }]
        }),
    );
    add_handler(
        &engine,
        json!({
            "name": "live",
            "event": "live_queue",
            "active": true,
            "actions": [{
                "action": "start_workflow",
                "start_workflow": {"name": "order_workflow"}
            }]
        }),
    );

    let manager = engine.event_queue_manager().unwrap();
    manager.refresh_event_queues().unwrap();
    assert_eq!(manager.get_queues(), vec![InlineStr::from("live_queue")]);
    assert_eq!(manager.get_queue_sizes().get("live_queue"), Some(&0));

    engine.metadata().remove_event_handler("live").unwrap();
    manager.refresh_event_queues().unwrap();
    assert!(manager.get_queues().is_empty());
}

#[test]
fn engine_without_event_queues_has_no_manager() {
    let engine = common::engine();
    assert!(engine.event_queue_manager().is_none());
}

#[test]
fn reset_callbacks_makes_delayed_retry_pollable() {
    let engine = common::engine();
    engine
        .metadata()
        .register_task_defs(
            vec![common::task_def(
                r#"{"name": "pack_order", "retryCount": 1, "retryLogic": "FIXED", "retryDelaySeconds": 30}"#,
            )],
            "test",
        )
        .unwrap();
    common::register_workflow(&engine, ORDER_WORKFLOW);

    let workflow_id = common::start(&engine, "order_workflow", object_map! {"orderId" => "o-4"});
    let first = common::task_by_ref(&engine, &workflow_id, "pack_ref");
    let queue_name = QueueUtils::get_queue_name_by_task_model(&first);
    assert_eq!(
        engine.queue_dao().pop(&queue_name, 1, 0).unwrap(),
        vec![first.task_id.clone()]
    );
    common::fail(&engine, &first, "out of boxes");

    let retried = common::task_by_ref(&engine, &workflow_id, "pack_ref");
    assert_eq!(retried.retry_count, 1);
    assert_eq!(retried.callback_after_seconds, 30);
    assert!(engine.queue_dao().pop(&queue_name, 1, 0).unwrap().is_empty());

    engine
        .executor()
        .reset_callbacks_from_workflow(&workflow_id)
        .unwrap();

    let retried = common::task_by_ref(&engine, &workflow_id, "pack_ref");
    assert_eq!(retried.callback_after_seconds, 0);
    assert_eq!(
        engine.queue_dao().pop(&queue_name, 1, 0).unwrap(),
        vec![retried.task_id.clone()]
    );
}

#[test]
fn reset_callbacks_rejects_terminal_workflow() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["pack_order"]);
    common::register_workflow(&engine, ORDER_WORKFLOW);

    let workflow_id = common::start(&engine, "order_workflow", object_map! {"orderId" => "o-5"});
    let pack = common::task_by_ref(&engine, &workflow_id, "pack_ref");
    common::complete(&engine, &pack, HashMap::new());

    let err = engine
        .executor()
        .reset_callbacks_from_workflow(&workflow_id)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::conflict_code());
}

#[test]
fn isolated_task_definitions_add_system_task_queues() {
    let engine = common::engine();
    engine
        .metadata()
        .register_task_defs(
            vec![common::task_def(
                r#"{"name": "pack_order", "isolationGroupId": "iso", "executionNameSpace": "ns"}"#,
            )],
            "test",
        )
        .unwrap();

    let producer = engine.isolated_task_queue_producer();
    let added = producer.add_task_queues();
    assert!(added.contains(&InlineStr::from("JOIN@ns-iso")));
    assert!(added.contains(&InlineStr::from("EVENT@ns-iso")));
    assert!(added.iter().all(|x| x.ends_with("@ns-iso")));
    assert!(producer.add_task_queues().is_empty());
    assert_eq!(producer.listening_queues().len(), added.len());

    engine.shutdown();
}
