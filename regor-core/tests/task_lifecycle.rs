mod common;

use regor_common::prelude::*;
use regor_core::{TaskStatus, WorkflowStatus};

const MAIL_A_BOX: &str = r#"
{
    "name": "mail_a_box",
    "version": 1,
    "tasks": [
        {
            "name": "shipping_info",
            "taskReferenceName": "shipping_info_ref",
            "inputParameters": {
                "account": "${workflow.input.accountNumber}"
            },
            "type": "SIMPLE"
        },
        {
            "name": "shipping_task",
            "taskReferenceName": "shipping_task_ref",
            "inputParameters": {
                "name": "${shipping_info_ref.output.name}",
                "zipcode": "${shipping_info_ref.output.zipcode}"
            },
            "type": "SIMPLE"
        }
    ],
    "outputParameters": {
        "trackingNumber": "${shipping_task_ref.output.trackingNumber}"
    }
}"#;

#[test]
fn sequential_tasks_complete_the_workflow() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["shipping_info", "shipping_task"]);
    common::register_workflow(&engine, MAIL_A_BOX);

    let workflow_id = common::start(&engine, "mail_a_box", object_map! {"accountNumber" => 42});

    let shipping_info = common::task_by_ref(&engine, &workflow_id, "shipping_info_ref");
    assert_eq!(shipping_info.input_data.get("account"), Some(&Object::Int(42)));
    assert!(!common::has_task(&engine, &workflow_id, "shipping_task_ref"));

    common::complete(
        &engine,
        &shipping_info,
        object_map! {"name" => "Ada", "zipcode" => "10115"},
    );
    assert!(!engine
        .queue_dao()
        .contains_message("shipping_info", &shipping_info.task_id)
        .expect("contains_message failed"));

    let shipping_task = common::task_by_ref(&engine, &workflow_id, "shipping_task_ref");
    assert_eq!(shipping_task.status, TaskStatus::Scheduled);
    assert_eq!(shipping_task.seq, 2);
    assert_eq!(shipping_task.input_data.get("name"), Some(&Object::from("Ada")));
    assert_eq!(
        shipping_task.input_data.get("zipcode"),
        Some(&Object::from("10115"))
    );

    common::complete(
        &engine,
        &shipping_task,
        object_map! {"trackingNumber" => "1Z999"},
    );

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert!(workflow.end_time > 0);
    assert_eq!(
        workflow.output.get("trackingNumber"),
        Some(&Object::from("1Z999"))
    );
}

#[test]
fn in_progress_update_keeps_worker_task_scheduled() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["shipping_info", "shipping_task"]);
    common::register_workflow(&engine, MAIL_A_BOX);
    let workflow_id = common::start(&engine, "mail_a_box", object_map!());

    let task = common::task_by_ref(&engine, &workflow_id, "shipping_info_ref");
    let mut result = regor_common::TaskResult::new(
        &workflow_id,
        &task.task_id,
        regor_common::TaskResultStatus::InProgress,
    );
    result.callback_after_seconds = 10;
    engine.executor().update_task(result).expect("update_task failed");

    let task = common::task_by_ref(&engine, &workflow_id, "shipping_info_ref");
    assert_eq!(task.status, TaskStatus::Scheduled);
    assert_eq!(task.callback_after_seconds, 10);
    assert!(engine
        .queue_dao()
        .contains_message("shipping_info", &task.task_id)
        .expect("contains_message failed"));
}

#[test]
fn update_of_a_finished_task_is_ignored() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["shipping_info", "shipping_task"]);
    common::register_workflow(&engine, MAIL_A_BOX);
    let workflow_id = common::start(&engine, "mail_a_box", object_map!());

    let task = common::task_by_ref(&engine, &workflow_id, "shipping_info_ref");
    common::complete(&engine, &task, object_map! {"name" => "first"});
    // a second report of the same task does not schedule anything again
    engine
        .executor()
        .update_task(
            regor_common::TaskResult::new(
                &workflow_id,
                &task.task_id,
                regor_common::TaskResultStatus::Failed,
            )
            .with_reason("late failure"),
        )
        .expect("update_task failed");

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Running);
    assert_eq!(workflow.tasks.len(), 2);
    let task = common::task_by_ref(&engine, &workflow_id, "shipping_info_ref");
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.output_data.get("name"), Some(&Object::from("first")));
}

#[test]
fn exhausted_retries_complete_the_task_with_errors() {
    let engine = common::engine();
    engine
        .metadata()
        .register_task_defs(
            vec![common::task_def(
                r#"{"name": "flaky", "retryCount": 2, "retryLogic": "FIXED", "retryDelaySeconds": 5}"#,
            )],
            "test",
        )
        .expect("register_task_defs failed");
    common::register_simple_tasks(&engine, &["after_flaky"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "flaky_workflow",
            "tasks": [
                {"name": "flaky", "taskReferenceName": "flaky_ref", "type": "SIMPLE"},
                {"name": "after_flaky", "taskReferenceName": "after_flaky_ref", "type": "SIMPLE"}
            ]
        }"#,
    );
    let workflow_id = common::start(&engine, "flaky_workflow", object_map!());

    let first = common::task_by_ref(&engine, &workflow_id, "flaky_ref");
    common::fail(&engine, &first, "boom 1");

    let second = common::task_by_ref(&engine, &workflow_id, "flaky_ref");
    assert_ne!(second.task_id, first.task_id);
    assert_eq!(second.retry_count, 1);
    assert_eq!(second.retried_task_id, first.task_id);
    assert_eq!(second.status, TaskStatus::Scheduled);
    assert_eq!(second.callback_after_seconds, 5);
    let first = engine
        .executor()
        .get_task(&first.task_id)
        .expect("get_task failed")
        .expect("first attempt not found");
    assert_eq!(first.status, TaskStatus::Failed);
    assert!(first.retried);

    common::fail(&engine, &second, "boom 2");
    let third = common::task_by_ref(&engine, &workflow_id, "flaky_ref");
    assert_eq!(third.retry_count, 2);

    common::fail(&engine, &third, "boom 3");
    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Running);
    assert!(workflow.failed_reference_task_names.contains("flaky_ref"));
    let third = common::task_by_ref(&engine, &workflow_id, "flaky_ref");
    assert_eq!(third.status, TaskStatus::CompletedWithErrors);
    assert!(third.reason_for_incompletion.contains("boom 3"));
    let flaky_attempts = workflow
        .tasks
        .iter()
        .filter(|x| x.reference_task_name == "flaky_ref")
        .count();
    assert_eq!(flaky_attempts, 3);

    let after = common::task_by_ref(&engine, &workflow_id, "after_flaky_ref");
    common::complete(&engine, &after, object_map!());
    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert!(workflow.failed_task_names.contains("flaky"));
}

#[test]
fn exhausted_last_task_completes_the_workflow() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["lonely"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "lonely_workflow",
            "tasks": [
                {"name": "lonely", "taskReferenceName": "lonely_ref", "type": "SIMPLE"}
            ]
        }"#,
    );
    let workflow_id = common::start(&engine, "lonely_workflow", object_map!());
    let task = common::task_by_ref(&engine, &workflow_id, "lonely_ref");
    common::fail(&engine, &task, "gave up");

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.tasks.len(), 1);
    let task = common::task_by_ref(&engine, &workflow_id, "lonely_ref");
    assert_eq!(task.status, TaskStatus::CompletedWithErrors);
}

#[test]
fn failed_optional_task_completes_with_errors() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["maybe", "after"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "optional_workflow",
            "tasks": [
                {"name": "maybe", "taskReferenceName": "maybe_ref", "type": "SIMPLE", "optional": true},
                {"name": "after", "taskReferenceName": "after_ref", "type": "SIMPLE"}
            ]
        }"#,
    );
    let workflow_id = common::start(&engine, "optional_workflow", object_map!());

    let maybe = common::task_by_ref(&engine, &workflow_id, "maybe_ref");
    common::fail(&engine, &maybe, "not this time");

    let maybe = common::task_by_ref(&engine, &workflow_id, "maybe_ref");
    assert_eq!(maybe.status, TaskStatus::CompletedWithErrors);
    let after = common::task_by_ref(&engine, &workflow_id, "after_ref");
    common::complete(&engine, &after, object_map! {"done" => true});

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.output.get("done"), Some(&Object::Boolean(true)));
}

#[test]
fn terminate_task_ends_the_workflow() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["check", "never"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "terminate_workflow",
            "tasks": [
                {"name": "check", "taskReferenceName": "check_ref", "type": "SIMPLE"},
                {
                    "name": "stop",
                    "taskReferenceName": "stop_ref",
                    "type": "TERMINATE",
                    "inputParameters": {
                        "terminationStatus": "COMPLETED",
                        "workflowOutput": {"result": "${check_ref.output.value}"}
                    }
                },
                {"name": "never", "taskReferenceName": "never_ref", "type": "SIMPLE"}
            ]
        }"#,
    );
    let workflow_id = common::start(&engine, "terminate_workflow", object_map!());

    let check = common::task_by_ref(&engine, &workflow_id, "check_ref");
    common::complete(&engine, &check, object_map! {"value" => "early"});

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.output.get("result"), Some(&Object::from("early")));
    assert!(!common::has_task(&engine, &workflow_id, "never_ref"));
    assert_eq!(
        common::task_by_ref(&engine, &workflow_id, "stop_ref").status,
        TaskStatus::Completed
    );
}

#[test]
fn terminate_task_can_fail_the_workflow() {
    let engine = common::engine();
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "fail_fast",
            "tasks": [
                {
                    "name": "stop",
                    "taskReferenceName": "stop_ref",
                    "type": "TERMINATE",
                    "inputParameters": {
                        "terminationStatus": "FAILED",
                        "terminationReason": "nothing to do"
                    }
                }
            ]
        }"#,
    );
    let workflow_id = common::start(&engine, "fail_fast", object_map!());

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert_eq!(workflow.reason_for_incompletion, "nothing to do");
}
