use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskDef;

use crate::config::Properties;
use crate::dao::{
    ConcurrentExecutionLimitDao, ExecutionDao, QueueDao, RateLimitingDao, DECIDER_QUEUE,
};
use crate::external::{PayloadType, TaskStatusListener};
use crate::model::{EventExecution, TaskModel, TaskStatus, WorkflowModel};
use crate::utils::{ExternalPayloadStorageUtils, QueueUtils};

/// Service that acts as a facade for accessing execution data from the `ExecutionDao`,
/// `RateLimitingDao` and `ConcurrentExecutionLimitDao` storage layers.
///
/// Payloads are externalized on the way in and restored on the way out, and the task status
/// listener is told about every status a task is persisted with.
pub struct ExecutionDaoFacade {
    execution_dao: Arc<dyn ExecutionDao>,
    queue_dao: Arc<dyn QueueDao>,
    concurrency_limit_dao: Arc<dyn ConcurrentExecutionLimitDao>,
    rate_limiting_dao: Arc<dyn RateLimitingDao>,
    payload_utils: Arc<ExternalPayloadStorageUtils>,
    task_status_listener: Option<Arc<dyn TaskStatusListener>>,
    properties: Arc<Properties>,
}

impl ExecutionDaoFacade {
    pub fn new(
        execution_dao: Arc<dyn ExecutionDao>,
        queue_dao: Arc<dyn QueueDao>,
        concurrency_limit_dao: Arc<dyn ConcurrentExecutionLimitDao>,
        rate_limiting_dao: Arc<dyn RateLimitingDao>,
        payload_utils: Arc<ExternalPayloadStorageUtils>,
        task_status_listener: Option<Arc<dyn TaskStatusListener>>,
        properties: Arc<Properties>,
    ) -> Self {
        Self {
            execution_dao,
            queue_dao,
            concurrency_limit_dao,
            rate_limiting_dao,
            payload_utils,
            task_status_listener,
            properties,
        }
    }

    // ******************************************
    // *************** Workflow *****************
    // ******************************************

    /// The workflow with its payloads restored, `NotFound` if there is no such workflow.
    pub fn get_workflow_model(
        &self,
        workflow_id: &str,
        include_tasks: bool,
    ) -> RegorResult<WorkflowModel> {
        let mut workflow = self
            .execution_dao
            .get_workflow(workflow_id, include_tasks)?
            .ok_or_else(|| {
                ErrorCode::NotFound(format!("No such workflow found by id: {}", workflow_id))
            })?;
        self.populate_workflow_and_task_payload_data(&mut workflow)?;
        Ok(workflow)
    }

    /// Creates a new workflow in the data store and adds it to the decider queue.
    pub fn create_workflow(&self, workflow: &mut WorkflowModel) -> RegorResult<()> {
        self.externalize_workflow_data(workflow)?;
        self.execution_dao.create_workflow(workflow)?;
        self.queue_dao.push(
            DECIDER_QUEUE,
            &workflow.workflow_id,
            workflow.priority,
            self.properties.workflow_offset_timeout_secs,
        )
    }

    pub fn update_workflow(&self, workflow: &mut WorkflowModel) -> RegorResult<()> {
        let now = Utc::now().timestamp_millis();
        workflow.updated_time = now;
        if workflow.status.is_terminal() && workflow.end_time == 0 {
            workflow.end_time = now;
        }
        self.externalize_workflow_data(workflow)?;
        self.execution_dao.update_workflow(workflow)
    }

    fn externalize_workflow_data(&self, workflow: &mut WorkflowModel) -> RegorResult<()> {
        self.payload_utils
            .verify_and_upload_workflow(workflow, PayloadType::WorkflowInput)?;
        self.payload_utils
            .verify_and_upload_workflow(workflow, PayloadType::WorkflowOutput)
    }

    pub fn remove_from_pending_workflow(
        &self,
        workflow_type: &str,
        workflow_id: &str,
    ) -> RegorResult<()> {
        self.execution_dao
            .remove_from_pending_workflow(workflow_type, workflow_id)
    }

    pub fn get_running_workflow_ids(&self, workflow_name: &str) -> RegorResult<Vec<InlineStr>> {
        self.execution_dao.get_running_workflow_ids(workflow_name)
    }

    /// Removes the workflow with its tasks and every queue message referring to them.
    pub fn remove_workflow(&self, workflow_id: &str) -> RegorResult<()> {
        let workflow = self.get_workflow_model(workflow_id, true)?;
        for task in &workflow.tasks {
            let queue_name = QueueUtils::get_queue_name_by_task_model(task);
            if let Err(e) = self.queue_dao.remove(&queue_name, &task.task_id) {
                info!(
                    "Error removing task: {} of workflow: {} from {} queue, error: {}",
                    task.task_id, workflow_id, queue_name, e
                );
            }
            self.execution_dao.remove_task(&task.task_id)?;
        }
        self.execution_dao.remove_workflow(workflow_id)?;

        if let Err(e) = self.queue_dao.remove(DECIDER_QUEUE, workflow_id) {
            info!(
                "Error removing workflow: {} from decider queue, error: {}",
                workflow_id, e
            );
        }
        Ok(())
    }

    // ******************************************
    // *************** Task *********************
    // ******************************************

    pub fn get_task_model(&self, task_id: &str) -> RegorResult<Option<TaskModel>> {
        match self.execution_dao.get_task(task_id)? {
            Some(mut task) => {
                self.payload_utils.internalize_task(&mut task)?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    pub fn get_tasks_for_workflow(&self, workflow_id: &str) -> RegorResult<Vec<TaskModel>> {
        let mut tasks = self.execution_dao.get_tasks_for_workflow(workflow_id)?;
        for task in tasks.iter_mut() {
            self.payload_utils.internalize_task(task)?;
        }
        Ok(tasks)
    }

    /// Persists new tasks, skipping the ones already scheduled. Returns the created ones.
    pub fn create_tasks(&self, tasks: &mut [TaskModel]) -> RegorResult<Vec<TaskModel>> {
        for task in tasks.iter_mut() {
            self.externalize_task_data(task)?;
        }
        let created = self.execution_dao.create_tasks(tasks)?;
        for task in &created {
            self.notify_task_status_listener(task);
        }
        Ok(created)
    }

    /// Sets the update time for the task, and the end time once it is terminal, before saving it.
    pub fn update_task(&self, task: &mut TaskModel) -> RegorResult<()> {
        let now = Utc::now().timestamp_millis();
        if !task.status.is_terminal() || task.update_time == 0 {
            task.update_time = now;
        }
        if task.status.is_terminal() && task.end_time == 0 {
            task.end_time = now;
        }

        let previous_status = match &self.task_status_listener {
            Some(_) => self.execution_dao.get_task(&task.task_id)?.map(|x| x.status),
            None => None,
        };

        self.externalize_task_data(task)?;
        self.execution_dao.update_task(task)?;

        if previous_status != Some(task.status) {
            self.notify_task_status_listener(task);
        }
        Ok(())
    }

    /// Persists every task, logging the failures. Returns false if any of them failed.
    pub fn update_tasks(&self, tasks: &mut [TaskModel]) -> bool {
        let mut all_updated = true;
        for task in tasks.iter_mut() {
            if let Err(e) = self.update_task(task) {
                error!("Error updating task: {}, error: {}", task.task_id, e);
                all_updated = false;
            }
        }
        all_updated
    }

    pub fn remove_task(&self, task_id: &str) -> RegorResult<bool> {
        self.execution_dao.remove_task(task_id)
    }

    fn externalize_task_data(&self, task: &mut TaskModel) -> RegorResult<()> {
        self.payload_utils
            .verify_and_upload_task(task, PayloadType::TaskInput)?;
        self.payload_utils
            .verify_and_upload_task(task, PayloadType::TaskOutput)
    }

    pub fn extend_lease(&self, task: &mut TaskModel) -> RegorResult<()> {
        task.update_time = Utc::now().timestamp_millis();
        self.execution_dao.update_task(task)
    }

    pub fn exceeds_in_progress_limit(&self, task: &TaskModel) -> bool {
        self.concurrency_limit_dao.exceeds_limit(task)
    }

    pub fn exceeds_rate_limit_per_frequency(
        &self,
        task: &TaskModel,
        task_def: Option<&TaskDef>,
    ) -> bool {
        self.rate_limiting_dao
            .exceeds_rate_limit_per_frequency(task, task_def)
    }

    // ******************************************
    // *************** Event ********************
    // ******************************************

    /// Records the execution unless it was recorded before, in which case false is returned.
    pub fn add_event_execution(&self, event_execution: &mut EventExecution) -> RegorResult<bool> {
        event_execution.created = Utc::now().timestamp_millis();
        self.execution_dao.add_event_execution(event_execution)
    }

    pub fn update_event_execution(&self, event_execution: &EventExecution) -> RegorResult<()> {
        self.execution_dao.update_event_execution(event_execution)
    }

    pub fn remove_event_execution(&self, event_execution: &EventExecution) -> RegorResult<()> {
        self.execution_dao.remove_event_execution(event_execution)
    }

    pub fn get_event_executions(
        &self,
        event_handler_name: &str,
        event: &str,
        message_id: Option<&str>,
    ) -> RegorResult<Vec<EventExecution>> {
        self.execution_dao
            .get_event_executions(event_handler_name, event, message_id)
    }

    /// Populates the workflow input data and the tasks input/output data if stored in external
    /// payload storage.
    pub fn populate_workflow_and_task_payload_data(
        &self,
        workflow: &mut WorkflowModel,
    ) -> RegorResult<()> {
        self.payload_utils.internalize_workflow(workflow)?;
        for task in workflow.tasks.iter_mut() {
            self.payload_utils.internalize_task(task)?;
        }
        Ok(())
    }

    fn notify_task_status_listener(&self, task: &TaskModel) {
        let listener = match &self.task_status_listener {
            Some(listener) => listener,
            None => return,
        };
        match task.status {
            TaskStatus::Scheduled => listener.on_task_scheduled(task),
            TaskStatus::InProgress => listener.on_task_in_progress(task),
            TaskStatus::Canceled => listener.on_task_canceled(task),
            TaskStatus::Failed => listener.on_task_failed(task),
            TaskStatus::FailedWithTerminalError => listener.on_task_failed_with_terminal_error(task),
            TaskStatus::Completed => listener.on_task_completed(task),
            TaskStatus::CompletedWithErrors => listener.on_task_completed_with_errors(task),
            TaskStatus::TimedOut => listener.on_task_timed_out(task),
            TaskStatus::Skipped => listener.on_task_skipped(task),
        }
    }
}
