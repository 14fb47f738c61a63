mod common;

use regor_common::prelude::*;

const MAIL_A_BOX: &str = r#"
{
    "name": "mail_a_box",
    "description": "shipping Workflow",
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
    },
    "failureWorkflow": "shipping_issues",
    "restartable": true,
    "workflowStatusListenerEnabled": true,
    "ownerEmail": "example@example.com",
    "timeoutPolicy": "ALERT_ONLY",
    "timeoutSeconds": 0,
    "variables": {},
    "inputTemplate": {}
}"#;

const ENCODE_TASK: &str = r#"
{
    "name": "encode_task",
    "retryCount": 3,
    "timeoutSeconds": 1200,
    "inputKeys": [
        "sourceRequestId",
        "qcElementType"
    ],
    "outputKeys": [
        "state",
        "skipped",
        "result"
    ],
    "timeoutPolicy": "TIME_OUT_WF",
    "retryLogic": "FIXED",
    "retryDelaySeconds": 600,
    "responseTimeoutSeconds": 600,
    "pollTimeoutSeconds": 3600,
    "concurrentExecLimit": 100,
    "rateLimitFrequencyInSeconds": 60,
    "rateLimitPerFrequency": 50,
    "ownerEmail": "foo@bar.com",
    "description": "Sample Encoding task"
}"#;

#[test]
fn register_workflow() {
    let engine = common::engine();
    let metadata = engine.metadata();

    metadata
        .register_workflow_def(common::workflow_def(MAIL_A_BOX))
        .expect("register_workflow_def failed");

    let workflow_def = metadata
        .get_workflow_def("mail_a_box", None)
        .expect("get_workflow_def failed");
    assert_eq!(workflow_def.version, 1);
    assert_eq!(workflow_def.tasks.len(), 2);
    assert_eq!(workflow_def.failure_workflow, "shipping_issues");

    let err = metadata
        .register_workflow_def(common::workflow_def(MAIL_A_BOX))
        .expect_err("registering the same version twice must fail");
    assert_eq!(err.code(), ErrorCode::conflict_code());
}

#[test]
fn update_workflow_adds_versions() {
    let engine = common::engine();
    let metadata = engine.metadata();

    let mut v2 = common::workflow_def(MAIL_A_BOX);
    v2.version = 2;
    metadata
        .update_workflow_defs(vec![common::workflow_def(MAIL_A_BOX), v2])
        .expect("update_workflow_defs failed");

    assert_eq!(
        metadata
            .get_workflow_def("mail_a_box", None)
            .expect("latest version not found")
            .version,
        2
    );
    assert_eq!(
        metadata
            .get_workflow_def("mail_a_box", Some(1))
            .expect("version 1 not found")
            .version,
        1
    );

    metadata
        .unregister_workflow_def("mail_a_box", 2)
        .expect("unregister_workflow_def failed");
    assert_eq!(
        metadata
            .get_workflow_def("mail_a_box", None)
            .expect("latest version not found")
            .version,
        1
    );
}

#[test]
fn missing_workflow_is_not_found() {
    let engine = common::engine();
    let err = engine
        .metadata()
        .get_workflow_def("nope", Some(3))
        .expect_err("no such workflow");
    assert_eq!(err.code(), ErrorCode::not_found_code());
}

#[test]
fn register_task() {
    let engine = common::engine();
    let metadata = engine.metadata();

    metadata
        .register_task_defs(vec![common::task_def(ENCODE_TASK)], "test")
        .expect("register_task_defs failed");

    let task_def = metadata
        .get_task_def("encode_task")
        .expect("get_task_def failed");
    assert_eq!(task_def.retry_count, 3);
    assert_eq!(task_def.retry_delay_seconds, 600);
    assert_eq!(task_def.created_by, "test");
    assert!(task_def.create_time > 0);
    assert_eq!(metadata.get_task_defs().expect("get_task_defs failed").len(), 1);
}

#[test]
fn update_task_keeps_creation_audit() {
    let engine = common::engine();
    let metadata = engine.metadata();

    metadata
        .register_task_defs(vec![common::task_def(ENCODE_TASK)], "creator")
        .expect("register_task_defs failed");
    let created = metadata.get_task_def("encode_task").expect("get_task_def failed");

    let mut task_def = common::task_def(ENCODE_TASK);
    task_def.retry_count = 5;
    metadata
        .update_task_def(task_def, "updater")
        .expect("update_task_def failed");

    let updated = metadata.get_task_def("encode_task").expect("get_task_def failed");
    assert_eq!(updated.retry_count, 5);
    assert_eq!(updated.created_by, "creator");
    assert_eq!(updated.create_time, created.create_time);
    assert_eq!(updated.updated_by, "updater");

    let err = metadata
        .update_task_def(common::task_def(r#"{"name": "unknown_task"}"#), "updater")
        .expect_err("updating an unknown task must fail");
    assert_eq!(err.code(), ErrorCode::not_found_code());
}

#[test]
fn response_timeout_longer_than_timeout_is_rejected() {
    let engine = common::engine();
    let mut task_def = common::task_def(ENCODE_TASK);
    task_def.response_timeout_seconds = task_def.timeout_seconds + 1;

    let err = engine
        .metadata()
        .register_task_defs(vec![task_def], "test")
        .expect_err("responseTimeoutSeconds above timeoutSeconds must be rejected");
    assert_eq!(err.code(), ErrorCode::illegal_argument_code());
    assert!(err.message().contains("encode_task"));
    assert!(engine.metadata().get_task_def("encode_task").is_err());
}

#[test]
fn invalid_task_definitions_are_rejected() {
    let value: serde_json::Value =
        serde_json::from_str(r#"{"name": "t", "retryCount": 11}"#).expect("parse json failed");
    assert!(regor_common::TaskDef::try_from(&value).is_err());

    let value: serde_json::Value = serde_json::from_str(
        r#"{"name": "t", "timeoutSeconds": 10, "responseTimeoutSeconds": 20}"#,
    )
    .expect("parse json failed");
    assert!(regor_common::TaskDef::try_from(&value).is_err());
}
