mod dal;
mod events;
mod execution;
mod metadata;
mod operation;
mod reconciliation;
mod sync;

pub use dal::ExecutionDaoFacade;
pub use events::{ActionProcessor, EventProcessor, EventQueueManager, SimpleActionProcessor};
pub use execution::{
    AsyncSystemTaskExecutor, DeciderService, Evaluator, EvaluatorRegistry,
    IsolatedTaskQueueProducer, StartWorkflowInput, SystemTaskRegistry, SystemTaskWorker,
    SystemTaskWorkerCoordinator, WorkflowExecutor, WorkflowSystemTask,
};
pub use metadata::MetadataMapperService;
pub use reconciliation::{WorkflowRepairService, WorkflowSweeper};
pub use sync::{LocalOnlyLock, Lock};
