use regor_common::prelude::*;
use regor_common::StartWorkflowRequest;

use crate::config::Properties;
use crate::dao::{
    ConcurrentExecutionLimitDao, EventHandlerDao, ExecutionDao, InMemoryEventHandlerDao,
    InMemoryExecutionDao, InMemoryMetadataDao, InMemoryQueueDao, MetadataDao, QueueDao,
    RateLimitingDao,
};
use crate::external::{
    EventQueues, ExternalPayloadStorage, TaskStatusListener, WorkflowStatusListener,
};
use crate::runtime::{
    ActionProcessor, AsyncSystemTaskExecutor, DeciderService, Evaluator, EvaluatorRegistry,
    EventProcessor, EventQueueManager, ExecutionDaoFacade, IsolatedTaskQueueProducer,
    LocalOnlyLock, Lock, MetadataMapperService, SimpleActionProcessor, StartWorkflowInput,
    SystemTaskRegistry, SystemTaskWorker, SystemTaskWorkerCoordinator, WorkflowExecutor,
    WorkflowRepairService, WorkflowSweeper,
};
use crate::service::{ExecutionLockService, MetadataService};
use crate::utils::ExternalPayloadStorageUtils;

/// Assembles an `Engine`. Every collaborator defaults to its in memory implementation.
#[derive(Default)]
pub struct EngineBuilder {
    execution_dao: Option<Arc<dyn ExecutionDao>>,
    concurrency_limit_dao: Option<Arc<dyn ConcurrentExecutionLimitDao>>,
    rate_limiting_dao: Option<Arc<dyn RateLimitingDao>>,
    metadata_dao: Option<Arc<dyn MetadataDao>>,
    event_handler_dao: Option<Arc<dyn EventHandlerDao>>,
    queue_dao: Option<Arc<dyn QueueDao>>,
    lock: Option<Arc<dyn Lock>>,
    task_status_listener: Option<Arc<dyn TaskStatusListener>>,
    workflow_status_listener: Option<Arc<dyn WorkflowStatusListener>>,
    payload_storage: Option<Arc<dyn ExternalPayloadStorage>>,
    event_queues: Option<Arc<dyn EventQueues>>,
    action_processor: Option<Arc<dyn ActionProcessor>>,
    evaluators: Vec<(InlineStr, Arc<dyn Evaluator>)>,
    properties: Option<Properties>,
}

impl EngineBuilder {
    pub fn with_execution_dao(mut self, execution_dao: Arc<dyn ExecutionDao>) -> Self {
        self.execution_dao = Some(execution_dao);
        self
    }

    pub fn with_concurrent_execution_limit_dao(
        mut self,
        concurrency_limit_dao: Arc<dyn ConcurrentExecutionLimitDao>,
    ) -> Self {
        self.concurrency_limit_dao = Some(concurrency_limit_dao);
        self
    }

    pub fn with_rate_limiting_dao(mut self, rate_limiting_dao: Arc<dyn RateLimitingDao>) -> Self {
        self.rate_limiting_dao = Some(rate_limiting_dao);
        self
    }

    pub fn with_metadata_dao(mut self, metadata_dao: Arc<dyn MetadataDao>) -> Self {
        self.metadata_dao = Some(metadata_dao);
        self
    }

    pub fn with_event_handler_dao(mut self, event_handler_dao: Arc<dyn EventHandlerDao>) -> Self {
        self.event_handler_dao = Some(event_handler_dao);
        self
    }

    pub fn with_queue_dao(mut self, queue_dao: Arc<dyn QueueDao>) -> Self {
        self.queue_dao = Some(queue_dao);
        self
    }

    pub fn with_lock(mut self, lock: Arc<dyn Lock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn with_task_status_listener(mut self, listener: Arc<dyn TaskStatusListener>) -> Self {
        self.task_status_listener = Some(listener);
        self
    }

    pub fn with_workflow_status_listener(
        mut self,
        listener: Arc<dyn WorkflowStatusListener>,
    ) -> Self {
        self.workflow_status_listener = Some(listener);
        self
    }

    pub fn with_payload_storage(mut self, storage: Arc<dyn ExternalPayloadStorage>) -> Self {
        self.payload_storage = Some(storage);
        self
    }

    pub fn with_event_queues(mut self, event_queues: Arc<dyn EventQueues>) -> Self {
        self.event_queues = Some(event_queues);
        self
    }

    /// Replaces the processor running the actions of the event handlers.
    pub fn with_action_processor(mut self, action_processor: Arc<dyn ActionProcessor>) -> Self {
        self.action_processor = Some(action_processor);
        self
    }

    /// Registers an evaluator under the given type, replacing a built-in one of the same type.
    pub fn with_evaluator(mut self, evaluator_type: &str, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluators.push((evaluator_type.into(), evaluator));
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn build(self) -> RegorResult<Engine> {
        let properties = Arc::new(self.properties.unwrap_or_default());

        let in_memory_execution_dao = Arc::new(InMemoryExecutionDao::new());
        let execution_dao = self
            .execution_dao
            .unwrap_or_else(|| in_memory_execution_dao.clone() as Arc<dyn ExecutionDao>);
        let concurrency_limit_dao = self.concurrency_limit_dao.unwrap_or_else(|| {
            in_memory_execution_dao.clone() as Arc<dyn ConcurrentExecutionLimitDao>
        });
        let rate_limiting_dao = self
            .rate_limiting_dao
            .unwrap_or_else(|| in_memory_execution_dao as Arc<dyn RateLimitingDao>);
        let metadata_dao = self
            .metadata_dao
            .unwrap_or_else(|| Arc::new(InMemoryMetadataDao::new()) as Arc<dyn MetadataDao>);
        let event_handler_dao = self.event_handler_dao.unwrap_or_else(|| {
            Arc::new(InMemoryEventHandlerDao::new()) as Arc<dyn EventHandlerDao>
        });
        let queue_dao = self
            .queue_dao
            .unwrap_or_else(|| Arc::new(InMemoryQueueDao::new()) as Arc<dyn QueueDao>);
        let lock = self
            .lock
            .unwrap_or_else(|| Arc::new(LocalOnlyLock::new()) as Arc<dyn Lock>);

        let evaluators = Arc::new(EvaluatorRegistry::new());
        for (evaluator_type, evaluator) in self.evaluators {
            evaluators.register(&evaluator_type, evaluator);
        }

        let payload_utils = Arc::new(ExternalPayloadStorageUtils::new(
            self.payload_storage,
            properties.clone(),
        ));
        let system_tasks = Arc::new(SystemTaskRegistry::new(
            evaluators.clone(),
            self.event_queues.clone(),
            properties.clone(),
        ));
        let execution_dao_facade = Arc::new(ExecutionDaoFacade::new(
            execution_dao,
            queue_dao.clone(),
            concurrency_limit_dao,
            rate_limiting_dao,
            payload_utils.clone(),
            self.task_status_listener,
            properties.clone(),
        ));
        let metadata_mapper = Arc::new(MetadataMapperService::new(metadata_dao.clone()));
        let decider = Arc::new(DeciderService::new(
            metadata_dao.clone(),
            system_tasks.clone(),
            evaluators.clone(),
            payload_utils,
            properties.clone(),
        ));
        let execution_lock_service = Arc::new(ExecutionLockService::new(lock, properties.clone()));

        let executor = Arc::new(WorkflowExecutor::new(
            decider,
            execution_dao_facade.clone(),
            queue_dao.clone(),
            metadata_mapper.clone(),
            system_tasks.clone(),
            execution_lock_service,
            self.workflow_status_listener,
            properties.clone(),
        ));
        let async_system_task_executor = Arc::new(AsyncSystemTaskExecutor::new(
            executor.clone(),
            queue_dao.clone(),
            metadata_mapper,
            properties.clone(),
        ));
        let system_task_worker = Arc::new(SystemTaskWorker::new(
            async_system_task_executor.clone(),
            queue_dao.clone(),
            properties.clone(),
        )?);
        let system_task_worker_coordinator =
            SystemTaskWorkerCoordinator::new(system_task_worker.clone(), system_tasks.clone());
        let isolated_task_queue_producer = Arc::new(IsolatedTaskQueueProducer::new(
            metadata_dao.clone(),
            system_tasks,
            system_task_worker.clone(),
            properties.clone(),
        ));
        let event_queue_manager = match self.event_queues {
            Some(event_queues) => {
                let action_processor = self.action_processor.unwrap_or_else(|| {
                    Arc::new(SimpleActionProcessor::new(executor.clone())) as Arc<dyn ActionProcessor>
                });
                let event_processor = Arc::new(EventProcessor::new(
                    event_handler_dao.clone(),
                    execution_dao_facade.clone(),
                    action_processor,
                    evaluators,
                ));
                Some(Arc::new(EventQueueManager::new(
                    event_handler_dao.clone(),
                    event_queues,
                    event_processor,
                    properties.clone(),
                )?))
            }
            None => None,
        };
        let repair_service = Arc::new(WorkflowRepairService::new(
            execution_dao_facade,
            queue_dao.clone(),
            executor.system_tasks().clone(),
            properties.workflow_offset_timeout_secs,
        ));
        let sweeper = Arc::new(WorkflowSweeper::new(
            executor.clone(),
            Some(repair_service.clone()),
            queue_dao.clone(),
            properties.clone(),
        )?);

        Ok(Engine {
            metadata_service: MetadataService::new(metadata_dao, event_handler_dao),
            executor,
            async_system_task_executor,
            system_task_worker,
            system_task_worker_coordinator,
            isolated_task_queue_producer,
            event_queue_manager,
            repair_service,
            sweeper,
            queue_dao,
            properties,
        })
    }
}

/// A workflow engine: the metadata registry, the executor and the background pollers that
/// drive the asynchronous system tasks, serve the event queues and sweep the running workflows.
pub struct Engine {
    metadata_service: MetadataService,
    executor: Arc<WorkflowExecutor>,
    async_system_task_executor: Arc<AsyncSystemTaskExecutor>,
    system_task_worker: Arc<SystemTaskWorker>,
    system_task_worker_coordinator: SystemTaskWorkerCoordinator,
    isolated_task_queue_producer: Arc<IsolatedTaskQueueProducer>,
    event_queue_manager: Option<Arc<EventQueueManager>>,
    repair_service: Arc<WorkflowRepairService>,
    sweeper: Arc<WorkflowSweeper>,
    queue_dao: Arc<dyn QueueDao>,
    properties: Arc<Properties>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn metadata(&self) -> &MetadataService {
        &self.metadata_service
    }

    pub fn executor(&self) -> &Arc<WorkflowExecutor> {
        &self.executor
    }

    pub fn async_system_task_executor(&self) -> &Arc<AsyncSystemTaskExecutor> {
        &self.async_system_task_executor
    }

    pub fn system_task_worker(&self) -> &Arc<SystemTaskWorker> {
        &self.system_task_worker
    }

    pub fn isolated_task_queue_producer(&self) -> &Arc<IsolatedTaskQueueProducer> {
        &self.isolated_task_queue_producer
    }

    /// Present when the engine was built with event queues.
    pub fn event_queue_manager(&self) -> Option<&Arc<EventQueueManager>> {
        self.event_queue_manager.as_ref()
    }

    pub fn repair_service(&self) -> &Arc<WorkflowRepairService> {
        &self.repair_service
    }

    pub fn sweeper(&self) -> &Arc<WorkflowSweeper> {
        &self.sweeper
    }

    pub fn queue_dao(&self) -> &Arc<dyn QueueDao> {
        &self.queue_dao
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Starts a workflow from a client request, returns the workflow id.
    pub fn start_workflow(&self, request: StartWorkflowRequest) -> RegorResult<InlineStr> {
        self.executor.start_workflow(StartWorkflowInput::from(request))
    }

    /// Starts polling the asynchronous system task queues and the event queues, and sweeping
    /// the decider queue.
    pub fn start(&self) {
        self.system_task_worker_coordinator.init_system_task_executor();
        self.isolated_task_queue_producer.start();
        if let Some(event_queue_manager) = &self.event_queue_manager {
            event_queue_manager.start();
        }
        self.sweeper.start();
    }

    pub fn shutdown(&self) {
        self.sweeper.shutdown();
        if let Some(event_queue_manager) = &self.event_queue_manager {
            event_queue_manager.shutdown();
        }
        self.isolated_task_queue_producer.shutdown();
        self.system_task_worker.shutdown();
        info!("Engine stopped");
    }
}
