mod common;

use regor_common::prelude::*;
use regor_core::{Engine, TaskStatus, WorkflowStatus, DECIDER_QUEUE};

const TWO_STEPS: &str = r#"
{
    "name": "two_steps",
    "version": 1,
    "restartable": true,
    "tasks": [
        {"name": "step_one", "taskReferenceName": "one", "type": "SIMPLE"},
        {"name": "step_two", "taskReferenceName": "two", "type": "SIMPLE"}
    ],
    "variables": {"attempt": "initial"}
}"#;

fn two_steps_engine() -> Engine {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["step_one", "step_two"]);
    common::register_workflow(&engine, TWO_STEPS);
    engine
}

#[test]
fn paused_workflow_schedules_nothing_until_resumed() {
    let engine = two_steps_engine();
    let workflow_id = common::start(&engine, "two_steps", object_map!());

    engine
        .executor()
        .pause_workflow(&workflow_id)
        .expect("pause_workflow failed");
    // pausing again is a no-op
    engine
        .executor()
        .pause_workflow(&workflow_id)
        .expect("pause_workflow failed");
    assert_eq!(
        common::workflow(&engine, &workflow_id).status,
        WorkflowStatus::Paused
    );

    let one = common::task_by_ref(&engine, &workflow_id, "one");
    common::complete(&engine, &one, object_map!());
    assert!(!common::has_task(&engine, &workflow_id, "two"));

    engine
        .executor()
        .resume_workflow(&workflow_id)
        .expect("resume_workflow failed");
    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Running);
    assert!(workflow.last_retried_time > 0);
    assert_eq!(
        common::task_by_ref(&engine, &workflow_id, "two").status,
        TaskStatus::Scheduled
    );

    let err = engine
        .executor()
        .resume_workflow(&workflow_id)
        .expect_err("a running workflow cannot be resumed");
    assert_eq!(err.code(), ErrorCode::conflict_code());
}

#[test]
fn terminate_cancels_pending_tasks() {
    let engine = two_steps_engine();
    let workflow_id = common::start(&engine, "two_steps", object_map!());
    let one = common::task_by_ref(&engine, &workflow_id, "one");

    engine
        .executor()
        .terminate_workflow(&workflow_id, "operator request")
        .expect("terminate_workflow failed");

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Terminated);
    assert_eq!(workflow.reason_for_incompletion, "operator request");
    assert!(workflow.end_time > 0);
    assert_eq!(
        common::task_by_ref(&engine, &workflow_id, "one").status,
        TaskStatus::Canceled
    );
    assert!(!engine
        .queue_dao()
        .contains_message("step_one", &one.task_id)
        .expect("contains_message failed"));

    let err = engine
        .executor()
        .pause_workflow(&workflow_id)
        .expect_err("a terminated workflow cannot be paused");
    assert_eq!(err.code(), ErrorCode::conflict_code());
}

#[test]
fn completed_workflow_cannot_be_terminated() {
    let engine = two_steps_engine();
    let workflow_id = common::start(&engine, "two_steps", object_map!());
    let one = common::task_by_ref(&engine, &workflow_id, "one");
    common::complete(&engine, &one, object_map!());
    let two = common::task_by_ref(&engine, &workflow_id, "two");
    common::complete(&engine, &two, object_map!());

    let err = engine
        .executor()
        .terminate_workflow(&workflow_id, "too late")
        .expect_err("a completed workflow cannot be terminated");
    assert_eq!(err.code(), ErrorCode::conflict_code());
}

#[test]
fn long_reasons_are_truncated() {
    let engine = two_steps_engine();
    let workflow_id = common::start(&engine, "two_steps", object_map!());

    let one = common::task_by_ref(&engine, &workflow_id, "one");
    common::fail(&engine, &one, &"x".repeat(800));
    assert_eq!(
        common::task_by_ref(&engine, &workflow_id, "one")
            .reason_for_incompletion
            .chars()
            .count(),
        500
    );

    engine
        .executor()
        .terminate_workflow(&workflow_id, &"y".repeat(800))
        .expect("terminate_workflow failed");
    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Terminated);
    assert_eq!(workflow.reason_for_incompletion.chars().count(), 500);
}

#[test]
fn retry_reruns_the_canceled_task() {
    let engine = two_steps_engine();
    let workflow_id = common::start(&engine, "two_steps", object_map!());

    let err = engine
        .executor()
        .retry(&workflow_id, false)
        .expect_err("a running workflow cannot be retried");
    assert_eq!(err.code(), ErrorCode::conflict_code());

    let one = common::task_by_ref(&engine, &workflow_id, "one");
    common::complete(&engine, &one, object_map!());
    let two = common::task_by_ref(&engine, &workflow_id, "two");
    engine
        .executor()
        .terminate_workflow(&workflow_id, "broken")
        .expect("terminate_workflow failed");
    assert_eq!(
        common::task_by_ref(&engine, &workflow_id, "two").status,
        TaskStatus::Canceled
    );

    engine
        .executor()
        .retry(&workflow_id, false)
        .expect("retry failed");

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Running);
    assert!(workflow.reason_for_incompletion.is_empty());
    assert_eq!(workflow.tasks.len(), 3);

    let retried = common::task_by_ref(&engine, &workflow_id, "two");
    assert_ne!(retried.task_id, two.task_id);
    assert_eq!(retried.retried_task_id, two.task_id);
    assert_eq!(retried.retry_count, 1);
    assert!(engine
        .queue_dao()
        .contains_message("step_two", &retried.task_id)
        .expect("contains_message failed"));
    assert!(engine
        .queue_dao()
        .contains_message(DECIDER_QUEUE, &workflow_id)
        .expect("contains_message failed"));

    common::complete(&engine, &retried, object_map!());
    assert_eq!(
        common::workflow(&engine, &workflow_id).status,
        WorkflowStatus::Completed
    );
    // the first task is not run again
    assert_eq!(
        common::workflow(&engine, &workflow_id)
            .tasks
            .iter()
            .filter(|x| x.reference_task_name == "one")
            .count(),
        1
    );
}

#[test]
fn retry_without_failed_tasks_is_a_conflict() {
    let engine = two_steps_engine();
    let workflow_id = common::start(&engine, "two_steps", object_map!());
    for ref_name in ["one", "two"] {
        let task = common::task_by_ref(&engine, &workflow_id, ref_name);
        common::complete(&engine, &task, object_map!());
    }

    let err = engine
        .executor()
        .retry(&workflow_id, false)
        .expect_err("nothing to retry");
    assert_eq!(err.code(), ErrorCode::conflict_code());
}

#[test]
fn restart_runs_the_workflow_from_the_beginning() {
    let engine = two_steps_engine();
    let workflow_id = common::start(&engine, "two_steps", object_map! {"order" => 7});

    let one = common::task_by_ref(&engine, &workflow_id, "one");
    engine
        .executor()
        .terminate_workflow(&workflow_id, "broken")
        .expect("terminate_workflow failed");
    assert_eq!(
        common::workflow(&engine, &workflow_id).status,
        WorkflowStatus::Terminated
    );

    engine
        .executor()
        .restart(&workflow_id, false)
        .expect("restart failed");

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Running);
    assert!(workflow.failed_reference_task_names.is_empty());
    assert_eq!(workflow.input.get("order"), Some(&Object::Int(7)));
    assert_eq!(
        workflow.variables.get("attempt"),
        Some(&Object::from("initial"))
    );
    assert_eq!(workflow.tasks.len(), 1);
    let restarted = common::task_by_ref(&engine, &workflow_id, "one");
    assert_ne!(restarted.task_id, one.task_id);
    assert_eq!(restarted.retry_count, 0);
    assert_eq!(restarted.status, TaskStatus::Scheduled);
    assert!(engine
        .executor()
        .get_task(&one.task_id)
        .expect("get_task failed")
        .is_none());
}

#[test]
fn restart_of_a_non_restartable_workflow_is_a_conflict() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["step_one"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "one_shot",
            "restartable": false,
            "tasks": [{"name": "step_one", "taskReferenceName": "one", "type": "SIMPLE"}]
        }"#,
    );
    let workflow_id = common::start(&engine, "one_shot", object_map!());
    engine
        .executor()
        .terminate_workflow(&workflow_id, "stop")
        .expect("terminate_workflow failed");

    let err = engine
        .executor()
        .restart(&workflow_id, false)
        .expect_err("not restartable");
    assert_eq!(err.code(), ErrorCode::conflict_code());
}
