mod common;

use regor_common::prelude::*;
use regor_core::{TaskStatus, WorkflowStatus};

#[test]
fn fork_join_waits_for_every_branch() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["left", "right"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "fork_join_workflow",
            "tasks": [
                {
                    "name": "fork",
                    "taskReferenceName": "fork_ref",
                    "type": "FORK_JOIN",
                    "forkTasks": [
                        [{"name": "left", "taskReferenceName": "left_ref", "type": "SIMPLE"}],
                        [{"name": "right", "taskReferenceName": "right_ref", "type": "SIMPLE"}]
                    ]
                },
                {
                    "name": "join",
                    "taskReferenceName": "join_ref",
                    "type": "JOIN",
                    "joinOn": ["left_ref", "right_ref"]
                }
            ]
        }"#,
    );
    let workflow_id = common::start(&engine, "fork_join_workflow", object_map!());

    assert_eq!(
        common::task_by_ref(&engine, &workflow_id, "fork_ref").status,
        TaskStatus::Completed
    );
    let left = common::task_by_ref(&engine, &workflow_id, "left_ref");
    let right = common::task_by_ref(&engine, &workflow_id, "right_ref");
    let join = common::task_by_ref(&engine, &workflow_id, "join_ref");
    assert_eq!(join.status, TaskStatus::InProgress);

    common::complete(&engine, &left, object_map! {"side" => "left"});
    common::execute_system_task(&engine, &join);
    let join = common::task_by_ref(&engine, &workflow_id, "join_ref");
    assert_eq!(join.status, TaskStatus::InProgress);
    assert_eq!(
        common::workflow(&engine, &workflow_id).status,
        WorkflowStatus::Running
    );

    common::complete(&engine, &right, object_map! {"side" => "right"});
    common::execute_system_task(&engine, &join);

    let join = common::task_by_ref(&engine, &workflow_id, "join_ref");
    assert_eq!(join.status, TaskStatus::Completed);
    assert_eq!(
        join.output_data.get("left_ref"),
        Some(&Object::from(object_map! {"side" => "left"}))
    );
    assert_eq!(
        join.output_data.get("right_ref"),
        Some(&Object::from(object_map! {"side" => "right"}))
    );
    assert_eq!(
        common::workflow(&engine, &workflow_id).status,
        WorkflowStatus::Completed
    );
}

#[test]
fn join_reports_a_branch_that_ran_out_of_retries() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["left", "right"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "fork_join_failure",
            "tasks": [
                {
                    "name": "fork",
                    "taskReferenceName": "fork_ref",
                    "type": "FORK_JOIN",
                    "forkTasks": [
                        [{"name": "left", "taskReferenceName": "left_ref", "type": "SIMPLE"}],
                        [{"name": "right", "taskReferenceName": "right_ref", "type": "SIMPLE"}]
                    ]
                },
                {
                    "name": "join",
                    "taskReferenceName": "join_ref",
                    "type": "JOIN",
                    "joinOn": ["left_ref", "right_ref"]
                }
            ]
        }"#,
    );
    let workflow_id = common::start(&engine, "fork_join_failure", object_map!());

    let left = common::task_by_ref(&engine, &workflow_id, "left_ref");
    common::fail(&engine, &left, "left broke");
    assert_eq!(
        common::task_by_ref(&engine, &workflow_id, "left_ref").status,
        TaskStatus::CompletedWithErrors
    );

    let join = common::task_by_ref(&engine, &workflow_id, "join_ref");
    common::execute_system_task(&engine, &join);
    let join = common::task_by_ref(&engine, &workflow_id, "join_ref");
    assert_eq!(join.status, TaskStatus::CompletedWithErrors);
    assert!(join.reason_for_incompletion.contains("left broke"));

    // the other branch keeps running
    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Running);
    let right = common::task_by_ref(&engine, &workflow_id, "right_ref");
    assert_eq!(right.status, TaskStatus::Scheduled);

    common::complete(&engine, &right, object_map!());
    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert!(workflow.failed_reference_task_names.contains("left_ref"));
    assert!(workflow.failed_reference_task_names.contains("join_ref"));
}

#[test]
fn do_while_runs_until_the_condition_is_false() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["loop_body"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "do_while_workflow",
            "tasks": [
                {
                    "name": "dw",
                    "taskReferenceName": "dw",
                    "type": "DO_WHILE",
                    "loopCondition": "$.dw['iteration'] < 3",
                    "loopOver": [
                        {"name": "loop_body", "taskReferenceName": "body", "type": "SIMPLE"}
                    ]
                }
            ]
        }"#,
    );
    let workflow_id = common::start(&engine, "do_while_workflow", object_map!());

    for iteration in 1..=3 {
        let ref_name = format!("body__{}", iteration);
        let body = common::task_by_ref(&engine, &workflow_id, &ref_name);
        assert_eq!(body.iteration, iteration);
        assert_eq!(
            common::workflow(&engine, &workflow_id).status,
            WorkflowStatus::Running
        );
        common::complete(&engine, &body, object_map! {"round" => iteration});
    }

    let workflow = common::workflow(&engine, &workflow_id);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert!(!common::has_task(&engine, &workflow_id, "body__4"));

    let dw = common::task_by_ref(&engine, &workflow_id, "dw");
    assert_eq!(dw.status, TaskStatus::Completed);
    assert_eq!(dw.output_data.get("iteration"), Some(&Object::Int(3)));
    for key in ["1", "2", "3"] {
        assert!(dw.output_data.contains_key(key), "missing output of iteration {}", key);
    }
    assert_eq!(
        dw.output_data.get("2"),
        Some(&Object::from(object_map! {"body" => object_map! {"round" => 2}}))
    );
}

#[test]
fn sub_workflow_completes_its_parent_task() {
    let engine = common::engine();
    common::register_simple_tasks(&engine, &["child_work"]);
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "child",
            "version": 1,
            "tasks": [
                {
                    "name": "child_work",
                    "taskReferenceName": "child_work_ref",
                    "inputParameters": {"item": "${workflow.input.item}"},
                    "type": "SIMPLE"
                }
            ]
        }"#,
    );
    common::register_workflow(
        &engine,
        r#"
        {
            "name": "parent",
            "version": 1,
            "tasks": [
                {
                    "name": "run_child",
                    "taskReferenceName": "run_child_ref",
                    "type": "SUB_WORKFLOW",
                    "inputParameters": {"item": "${workflow.input.item}"},
                    "subWorkflowParam": {"name": "child", "version": 1}
                }
            ]
        }"#,
    );
    let parent_id = common::start(&engine, "parent", object_map! {"item" => "book"});

    let run_child = common::task_by_ref(&engine, &parent_id, "run_child_ref");
    assert_eq!(run_child.status, TaskStatus::Scheduled);
    common::execute_system_task(&engine, &run_child);

    let run_child = common::task_by_ref(&engine, &parent_id, "run_child_ref");
    assert_eq!(run_child.status, TaskStatus::InProgress);
    assert!(!run_child.sub_workflow_id.is_empty());

    let child = common::workflow(&engine, &run_child.sub_workflow_id);
    assert_eq!(child.parent_workflow_id, parent_id);
    assert_eq!(child.parent_workflow_task_id, run_child.task_id);
    let child_work = common::task_by_ref(&engine, &child.workflow_id, "child_work_ref");
    assert_eq!(child_work.input_data.get("item"), Some(&Object::from("book")));

    common::complete(&engine, &child_work, object_map! {"shipped" => true});
    assert_eq!(
        common::workflow(&engine, &child.workflow_id).status,
        WorkflowStatus::Completed
    );

    let run_child = common::task_by_ref(&engine, &parent_id, "run_child_ref");
    assert_eq!(run_child.status, TaskStatus::Completed);
    assert_eq!(
        run_child.output_data.get("shipped"),
        Some(&Object::Boolean(true))
    );

    engine.executor().decide(&parent_id).expect("decide failed");
    assert_eq!(
        common::workflow(&engine, &parent_id).status,
        WorkflowStatus::Completed
    );
}

#[test]
fn terminating_the_parent_terminates_the_child() {
    let engine = common::engine();
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
    let parent_id = common::start(&engine, "parent", object_map!());
    let run_child = common::task_by_ref(&engine, &parent_id, "run_child_ref");
    common::execute_system_task(&engine, &run_child);
    let run_child = common::task_by_ref(&engine, &parent_id, "run_child_ref");

    engine
        .executor()
        .terminate_workflow(&parent_id, "stop everything")
        .expect("terminate_workflow failed");

    assert_eq!(
        common::workflow(&engine, &parent_id).status,
        WorkflowStatus::Terminated
    );
    let child = common::workflow(&engine, &run_child.sub_workflow_id);
    assert_eq!(child.status, WorkflowStatus::Terminated);
    assert_eq!(child.reason_for_incompletion, "stop everything");
}
