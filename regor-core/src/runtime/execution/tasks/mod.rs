mod do_while;
mod event;
mod exclusive_join;
mod inline;
mod isolated_task_queue_producer;
mod join;
mod lambda;
mod set_variable;
mod start_workflow;
mod sub_workflow;
mod switch;
mod system_task_registry;
mod system_task_worker;
mod system_task_worker_coordinator;
mod terminate;
mod wait;
mod workflow_system_task;

pub use do_while::DoWhile;
pub use event::Event;
pub use exclusive_join::ExclusiveJoin;
pub use inline::Inline;
pub use isolated_task_queue_producer::IsolatedTaskQueueProducer;
pub use join::Join;
pub use lambda::Lambda;
pub use set_variable::SetVariable;
pub use start_workflow::StartWorkflow;
pub use sub_workflow::SubWorkflow;
pub use switch::{Decision, Fork, Switch};
pub use system_task_registry::SystemTaskRegistry;
pub use system_task_worker::SystemTaskWorker;
pub use system_task_worker_coordinator::SystemTaskWorkerCoordinator;
pub use terminate::Terminate;
pub use wait::{Human, Wait};
pub use workflow_system_task::WorkflowSystemTask;
