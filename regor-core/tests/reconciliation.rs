mod common;

use std::thread;
use std::time::{Duration, Instant};

use regor_common::prelude::*;
use regor_core::{Engine, Properties, TaskStatus, WorkflowStatus, DECIDER_QUEUE};

const SINGLE_TASK: &str = r#"
{
    "name": "single_task",
    "tasks": [
        {"name": "lonely", "taskReferenceName": "lonely_ref", "type": "SIMPLE"}
    ]
}"#;

/// An engine whose decider queue messages are visible right away.
fn engine_with_repair() -> Engine {
    common::init_logger();
    let properties = Properties {
        workflow_offset_timeout_secs: 0,
        workflow_repair_service_enabled: true,
        ..Default::default()
    };
    let engine = Engine::builder()
        .with_properties(properties)
        .build()
        .expect("build engine failed");
    engine
        .metadata()
        .register_task_defs(
            vec![common::task_def(
                r#"{"name": "lonely", "retryCount": 0, "pollTimeoutSeconds": 5}"#,
            )],
            "test",
        )
        .expect("register_task_defs failed");
    common::register_workflow(&engine, SINGLE_TASK);
    engine
}

#[test]
fn decide_is_idempotent() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["lonely"]);
    common::register_workflow(&engine, SINGLE_TASK);
    let workflow_id = common::start(&engine, "single_task", object_map!());

    for _ in 0..3 {
        let workflow = engine
            .executor()
            .decide(&workflow_id)
            .expect("decide failed")
            .expect("lock not acquired");
        assert_eq!(workflow.status, WorkflowStatus::Running);
    }

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.tasks.len(), 1);
    assert_eq!(engine.queue_dao().size("lonely").expect("size failed"), 1);
}

#[test]
fn sweep_removes_finished_workflows_from_the_decider_queue() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["lonely"]);
    common::register_workflow(&engine, SINGLE_TASK);
    let workflow_id = common::start(&engine, "single_task", object_map!());
    engine
        .executor()
        .terminate_workflow(&workflow_id, "done with it")
        .expect("terminate_workflow failed");
    assert!(engine
        .queue_dao()
        .contains_message(DECIDER_QUEUE, &workflow_id)
        .expect("contains_message failed"));

    engine.sweeper().sweep(&workflow_id).expect("sweep failed");

    assert!(!engine
        .queue_dao()
        .contains_message(DECIDER_QUEUE, &workflow_id)
        .expect("contains_message failed"));
}

#[test]
fn sweep_drops_unknown_workflows() {
    let engine = common::engine();
    engine
        .queue_dao()
        .push(DECIDER_QUEUE, "ghost", 0, 0)
        .expect("push failed");

    engine.sweeper().sweep("ghost").expect("sweep failed");

    assert!(!engine
        .queue_dao()
        .contains_message(DECIDER_QUEUE, "ghost")
        .expect("contains_message failed"));
}

#[test]
fn sweep_repairs_lost_task_messages_and_sets_the_unack_timeout() {
    let engine = engine_with_repair();
    let workflow_id = common::start(&engine, "single_task", object_map!());
    let task = common::task_by_ref(&engine, &workflow_id, "lonely_ref");

    // the message is lost
    engine
        .queue_dao()
        .remove("lonely", &task.task_id)
        .expect("remove failed");

    let polled = engine
        .queue_dao()
        .pop(DECIDER_QUEUE, 1, 100)
        .expect("pop failed");
    assert_eq!(polled, vec![workflow_id.clone()]);

    engine.sweeper().sweep(&workflow_id).expect("sweep failed");

    assert!(engine
        .queue_dao()
        .contains_message("lonely", &task.task_id)
        .expect("contains_message failed"));
    // seen again only after the poll timeout of the scheduled task
    assert!(engine
        .queue_dao()
        .pop(DECIDER_QUEUE, 1, 0)
        .expect("pop failed")
        .is_empty());
    assert!(engine
        .queue_dao()
        .contains_message(DECIDER_QUEUE, &workflow_id)
        .expect("contains_message failed"));
    assert_eq!(
        common::workflow(&engine, &workflow_id).tasks.len(),
        1,
        "the sweep must not schedule the task again"
    );
}

#[test]
fn repair_service_puts_back_the_missing_messages() {
    let engine = engine_with_repair();
    let workflow_id = common::start(&engine, "single_task", object_map!());
    let task = common::task_by_ref(&engine, &workflow_id, "lonely_ref");

    let repair_service = engine.repair_service();
    assert!(!repair_service
        .verify_and_repair_workflow(&workflow_id, true)
        .expect("verify_and_repair_workflow failed"));

    engine
        .queue_dao()
        .remove("lonely", &task.task_id)
        .expect("remove failed");
    engine
        .queue_dao()
        .remove(DECIDER_QUEUE, &workflow_id)
        .expect("remove failed");

    assert!(repair_service
        .verify_and_repair_workflow(&workflow_id, true)
        .expect("verify_and_repair_workflow failed"));
    assert!(engine
        .queue_dao()
        .contains_message("lonely", &task.task_id)
        .expect("contains_message failed"));
    assert!(engine
        .queue_dao()
        .contains_message(DECIDER_QUEUE, &workflow_id)
        .expect("contains_message failed"));

    // a finished task is never queued again
    common::complete(&engine, &task, object_map!());
    let task = common::task_by_ref(&engine, &workflow_id, "lonely_ref");
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(!repair_service
        .verify_and_repair_task(&task)
        .expect("verify_and_repair_task failed"));
}

#[test]
fn background_workers_drive_async_system_tasks() {
    common::init_logger();
    let properties = Properties {
        sweep_disabled: true,
        system_task_worker_poll_interval_ms: 10,
        system_task_queue_pop_timeout_ms: 10,
        ..Default::default()
    };
    let engine = Engine::builder()
        .with_properties(properties)
        .build()
        .expect("build engine failed");
    common::register_simple_tasks(&engine, &["child_work"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "child",
            "tasks": [
                {"name": "child_work", "taskReferenceName": "child_work_ref", "type": "SIMPLE"}
            ]
        }"#,
    );
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "parent",
            "tasks": [
                {
                    "name": "run_child",
                    "taskReferenceName": "run_child_ref",
                    "type": "SUB_WORKFLOW",
                    "subWorkflowParam": {"name": "child"}
                }
            ]
        }"#,
    );
    engine.start();

    let parent_id = common::start(&engine, "parent", object_map!());
    let deadline = Instant::now() + Duration::from_secs(10);
    let run_child = loop {
        let run_child = common::task_by_ref(&engine, &parent_id, "run_child_ref");
        if run_child.status == TaskStatus::InProgress {
            break run_child;
        }
        assert!(Instant::now() < deadline, "sub workflow was never started");
        thread::sleep(Duration::from_millis(20));
    };
    engine.shutdown();

    let child = common::workflow(&engine, &run_child.sub_workflow_id);
    assert_eq!(child.status, WorkflowStatus::Running);
    assert_eq!(child.parent_workflow_id, parent_id);
}
