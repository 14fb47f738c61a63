mod evaluators;
mod mapper;
mod tasks;

mod async_system_task_executor;
mod decider_service;
mod start_workflow_input;
mod terminate_workflow;
mod workflow_executor;

pub use async_system_task_executor::AsyncSystemTaskExecutor;
pub use decider_service::DeciderService;
pub use evaluators::{Evaluator, EvaluatorRegistry, JavascriptEvaluator};
pub use start_workflow_input::StartWorkflowInput;
pub use tasks::{
    IsolatedTaskQueueProducer, SystemTaskRegistry, SystemTaskWorker, SystemTaskWorkerCoordinator,
    WorkflowSystemTask,
};
pub use workflow_executor::WorkflowExecutor;
