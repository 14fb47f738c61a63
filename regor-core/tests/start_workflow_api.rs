mod common;

use regor_common::prelude::*;
use regor_common::StartWorkflowRequest;
use regor_core::{TaskStatus, WorkflowStatus, DECIDER_QUEUE};

const ADHOC_SWITCH_REQUEST: &str = r#"
{
    "name": "my_adhoc_unregistered_workflow",
    "workflowDef": {
        "ownerApp": "my_owner_app",
        "ownerEmail": "my_owner_email@test.com",
        "createdBy": "my_username",
        "name": "my_adhoc_unregistered_workflow",
        "description": "Test Workflow setup",
        "version": 1,
        "tasks": [
            {
                "name": "switch_by_param",
                "taskReferenceName": "switch_by_param",
                "type": "SWITCH",
                "evaluatorType": "value-param",
                "expression": "switchCaseValue",
                "inputParameters": {
                    "switchCaseValue": "${workflow.input.service}"
                },
                "decisionCases": {
                    "fedex": [
                        {
                            "name": "Set_Name_fedex",
                            "taskReferenceName": "Set_Name_fedex",
                            "type": "SET_VARIABLE",
                            "inputParameters": {
                                "name": "Foo"
                            }
                        }
                    ],
                    "ups": [
                        {
                            "name": "Set_Name_ups",
                            "taskReferenceName": "Set_Name_ups",
                            "type": "SET_VARIABLE",
                            "inputParameters": {
                                "name": "Bar"
                            }
                        }
                    ]
                },
                "defaultCase": [
                    {
                        "name": "Set_Name_default",
                        "taskReferenceName": "Set_Name_default",
                        "type": "SET_VARIABLE",
                        "inputParameters": {
                            "name": "Default"
                        }
                    }
                ]
            }
        ],
        "outputParameters": {
            "output": "${workflow.variables.name}"
        }
    },
    "input": {
        "service": "ups"
    }
}"#;

fn adhoc_request(service: &str) -> StartWorkflowRequest {
    let mut request: serde_json::Value =
        serde_json::from_str(ADHOC_SWITCH_REQUEST).expect("parse json failed");
    request["input"]["service"] = serde_json::Value::from(service);
    StartWorkflowRequest::try_from(&request).expect("parse StartWorkflowRequest failed")
}

#[test]
fn start_workflow() {
    let engine = common::engine();

    let workflow_id = engine
        .start_workflow(adhoc_request("ups"))
        .expect("start_workflow failed");

    // only synchronous system tasks, the workflow is done once started
    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.output.get("output"), Some(&Object::from("Bar")));
    assert_eq!(workflow.variables.get("name"), Some(&Object::from("Bar")));
    assert!(workflow
        .tasks
        .iter()
        .all(|x| x.status == TaskStatus::Completed));
    assert!(!engine
        .queue_dao()
        .contains_message(DECIDER_QUEUE, &workflow_id)
        .expect("contains_message failed"));
}

#[test]
fn start_workflow_default_case() {
    let engine = common::engine();

    let workflow_id = engine
        .start_workflow(adhoc_request("dhl"))
        .expect("start_workflow failed");

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.output.get("output"), Some(&Object::from("Default")));
    assert!(common::has_task(&engine, &workflow_id, "Set_Name_default"));
    assert!(!common::has_task(&engine, &workflow_id, "Set_Name_ups"));
}

#[test]
fn start_workflow_registered() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["task_1"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "myWorkflow",
            "version": 1,
            "tasks": [
                {
                    "name": "task_1",
                    "taskReferenceName": "task_1_ref",
                    "inputParameters": {
                        "p1": "${workflow.input.param1}"
                    },
                    "type": "SIMPLE"
                }
            ]
        }"#,
    );

    let start_workflow_request = r#"
    {
        "name": "myWorkflow",
        "version": 1,
        "correlationId": "corr1",
        "priority": 1,
        "input": {
            "param1": "value1",
            "param2": "value2"
        },
        "taskToDomain": {}
    }"#;
    let start_workflow_request: serde_json::Value =
        serde_json::from_str(start_workflow_request).expect("parse json failed");
    let start_workflow_request: StartWorkflowRequest = (&start_workflow_request)
        .try_into()
        .expect("parse StartWorkflowRequest failed");

    let workflow_id = engine
        .start_workflow(start_workflow_request)
        .expect("start_workflow failed");

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Running);
    assert_eq!(workflow.correlation_id, "corr1");
    assert_eq!(workflow.priority, 1);

    let task = common::task_by_ref(&engine, &workflow_id, "task_1_ref");
    assert_eq!(task.status, TaskStatus::Scheduled);
    assert_eq!(task.input_data.get("p1"), Some(&Object::from("value1")));
    assert!(engine
        .queue_dao()
        .contains_message("task_1", &task.task_id)
        .expect("contains_message failed"));
    assert!(engine
        .queue_dao()
        .contains_message(DECIDER_QUEUE, &workflow_id)
        .expect("contains_message failed"));
}

#[test]
fn start_unknown_workflow_fails() {
    let engine = common::engine();

    let err = engine
        .start_workflow(StartWorkflowRequest::new("not_registered", None, object_map!()))
        .expect_err("an unknown workflow cannot start");
    assert_eq!(err.code(), ErrorCode::not_found_code());
}

#[test]
fn start_workflow_without_task_definition_fails() {
    let engine = common::engine();
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "undefined_task_workflow",
            "tasks": [
                {
                    "name": "never_registered",
                    "taskReferenceName": "never_registered",
                    "type": "SIMPLE"
                }
            ]
        }"#,
    );

    let err = engine
        .start_workflow(StartWorkflowRequest::new(
            "undefined_task_workflow",
            None,
            object_map!(),
        ))
        .expect_err("a task without definition cannot be scheduled");
    assert_eq!(err.code(), ErrorCode::illegal_argument_code());
}
