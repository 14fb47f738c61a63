mod config;
mod dao;
mod engine;
mod external;
mod metrics;
mod model;
mod runtime;
mod service;
mod utils;

pub use config::Properties;
pub use dao::{
    ConcurrentExecutionLimitDao, EventHandlerDao, ExecutionDao, InMemoryEventHandlerDao,
    InMemoryExecutionDao, InMemoryMetadataDao, InMemoryQueueDao, MetadataDao, QueueDao,
    RateLimitingDao, DECIDER_QUEUE,
};
pub use engine::{Engine, EngineBuilder};
pub use external::{
    EventQueues, ExternalPayloadStorage, ExternalStorageLocation, InMemoryEventQueues,
    InMemoryPayloadStorage, Message, Operation, PayloadType, TaskStatusListener,
    WorkflowStatusListener,
};
pub use model::{
    EventExecution, EventExecutionStatus, TaskModel, TaskStatus, WorkflowModel, WorkflowStatus,
};
pub use runtime::{
    ActionProcessor, AsyncSystemTaskExecutor, Evaluator, EvaluatorRegistry, EventProcessor,
    EventQueueManager, ExecutionDaoFacade, IsolatedTaskQueueProducer, LocalOnlyLock, Lock,
    SimpleActionProcessor, StartWorkflowInput, SystemTaskRegistry, SystemTaskWorker,
    WorkflowExecutor, WorkflowRepairService, WorkflowSweeper, WorkflowSystemTask,
};
pub use service::MetadataService;
pub use utils::{ParametersUtils, QueueUtils};
