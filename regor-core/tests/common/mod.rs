#![allow(dead_code)]

use regor_common::prelude::*;
use regor_common::{StartWorkflowRequest, TaskDef, TaskResult, TaskResultStatus, WorkflowDef};
use regor_core::{Engine, InMemoryEventQueues, Properties, TaskModel, TaskStatus, WorkflowModel};

pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

pub fn engine() -> Engine {
    init_logger();
    Engine::builder().build().expect("build engine failed")
}

pub fn engine_with_properties(properties: Properties) -> Engine {
    init_logger();
    Engine::builder()
        .with_properties(properties)
        .build()
        .expect("build engine failed")
}

/// An engine publishing EVENT tasks to in-memory queues, which are returned along with it.
pub fn engine_with_event_queues() -> (Engine, Arc<InMemoryEventQueues>) {
    init_logger();
    let queues = Arc::new(InMemoryEventQueues::new());
    let engine = Engine::builder()
        .with_event_queues(queues.clone())
        .build()
        .expect("build engine failed");
    (engine, queues)
}

pub fn task_def(json: &str) -> TaskDef {
    let value: serde_json::Value = serde_json::from_str(json).expect("parse json failed");
    TaskDef::try_from(&value).expect("parse TaskDef failed")
}

pub fn workflow_def(json: &str) -> WorkflowDef {
    let value: serde_json::Value = serde_json::from_str(json).expect("parse json failed");
    WorkflowDef::try_from(&value).expect("parse WorkflowDef failed")
}

/// Registers a task definition per name, with no retries.
pub fn register_simple_tasks(engine: &Engine, names: &[&str]) {
    let task_defs = names
        .iter()
        .map(|name| task_def(&format!(r#"{{"name": "{}", "retryCount": 0}}"#, name)))
        .collect();
    engine
        .metadata()
        .register_task_defs(task_defs, "test")
        .expect("register_task_defs failed");
}

pub fn register_workflow(engine: &Engine, json: &str) {
    engine
        .metadata()
        .register_workflow_def(workflow_def(json))
        .expect("register_workflow_def failed");
}

pub fn start(engine: &Engine, name: &str, input: HashMap<InlineStr, Object>) -> InlineStr {
    engine
        .start_workflow(StartWorkflowRequest::new(name, None, input))
        .expect("start_workflow failed")
}

pub fn workflow(engine: &Engine, workflow_id: &str) -> WorkflowModel {
    engine
        .executor()
        .get_workflow(workflow_id, true)
        .expect("get_workflow failed")
}

/// The latest attempt of the task with the given reference name.
pub fn task_by_ref(engine: &Engine, workflow_id: &str, ref_name: &str) -> TaskModel {
    workflow(engine, workflow_id)
        .tasks
        .into_iter()
        .filter(|x| x.reference_task_name == ref_name)
        .last()
        .unwrap_or_else(|| panic!("task {} not scheduled", ref_name))
}

pub fn has_task(engine: &Engine, workflow_id: &str, ref_name: &str) -> bool {
    workflow(engine, workflow_id)
        .tasks
        .iter()
        .any(|x| x.reference_task_name == ref_name)
}

/// Reports the task of a worker as done.
pub fn complete(engine: &Engine, task: &TaskModel, output: HashMap<InlineStr, Object>) {
    assert_eq!(task.status, TaskStatus::Scheduled, "{} is not scheduled", task.reference_task_name);
    engine
        .executor()
        .update_task(
            TaskResult::new(
                &task.workflow_instance_id,
                &task.task_id,
                TaskResultStatus::Completed,
            )
            .with_output(output),
        )
        .expect("update_task failed");
}

pub fn fail(engine: &Engine, task: &TaskModel, reason: &str) {
    engine
        .executor()
        .update_task(
            TaskResult::new(&task.workflow_instance_id, &task.task_id, TaskResultStatus::Failed)
                .with_reason(reason),
        )
        .expect("update_task failed");
}

/// Runs one pass of the asynchronous system task, as its queue poller would.
pub fn execute_system_task(engine: &Engine, task: &TaskModel) {
    let system_task = engine
        .executor()
        .system_tasks()
        .get(&task.task_type)
        .unwrap_or_else(|| panic!("{} is not a system task", task.task_type));
    engine
        .async_system_task_executor()
        .execute(system_task, &task.task_id)
        .expect("execute system task failed");
}

/// Drives an asynchronous system task until it is terminal, at most three passes.
pub fn run_until_terminal(engine: &Engine, workflow_id: &str, ref_name: &str) -> TaskModel {
    for _ in 0..3 {
        let task = task_by_ref(engine, workflow_id, ref_name);
        if task.status.is_terminal() {
            return task;
        }
        execute_system_task(engine, &task);
    }
    task_by_ref(engine, workflow_id, ref_name)
}
