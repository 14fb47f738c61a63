use chrono::Utc;
use regor_common::prelude::*;

use super::tasks::WorkflowSystemTask;
use super::WorkflowExecutor;
use crate::config::Properties;
use crate::dao::QueueDao;
use crate::metrics::Monitors;
use crate::model::{TaskModel, TaskStatus};
use crate::runtime::dal::ExecutionDaoFacade;
use crate::runtime::metadata::MetadataMapperService;
use crate::utils::QueueUtils;

/// Executes one asynchronous system task taken from its queue, then settles its queue message.
pub struct AsyncSystemTaskExecutor {
    executor: Arc<WorkflowExecutor>,
    execution_dao_facade: Arc<ExecutionDaoFacade>,
    queue_dao: Arc<dyn QueueDao>,
    metadata_mapper: Arc<MetadataMapperService>,
    properties: Arc<Properties>,
}

impl AsyncSystemTaskExecutor {
    pub fn new(
        executor: Arc<WorkflowExecutor>,
        queue_dao: Arc<dyn QueueDao>,
        metadata_mapper: Arc<MetadataMapperService>,
        properties: Arc<Properties>,
    ) -> Self {
        Self {
            execution_dao_facade: executor.execution_dao_facade().clone(),
            executor,
            queue_dao,
            metadata_mapper,
            properties,
        }
    }

    /// Executes the given system task, the task is persisted whatever the outcome and the
    /// workflow decided when the task execution completed.
    pub fn execute(&self, system_task: Arc<dyn WorkflowSystemTask>, task_id: &str) -> RegorResult<()> {
        let mut task = match self.load_task_quietly(task_id) {
            Some(task) => task,
            None => {
                error!(
                    "TaskId: {} could not be found while executing {}",
                    task_id,
                    system_task.task_type()
                );
                Monitors::record_task_poll_error(system_task.task_type(), "NotFound");
                self.queue_dao.remove(system_task.task_type(), task_id)?;
                return Ok(());
            }
        };

        debug!(
            "Task: {:?} fetched from execution Dao for taskId: {}",
            task, task_id
        );
        let queue_name = QueueUtils::get_queue_name_by_task_model(&task);

        if task.status.is_terminal() {
            // Tune the SystemTaskWorkerCoordinator's queues - if the queue size is very big this
            // can happen!
            info!(
                "Task {}/{} was already completed.",
                task.task_type, task.task_id
            );
            self.queue_dao.remove(&queue_name, &task.task_id)?;
            return Ok(());
        }

        if task.status == TaskStatus::Scheduled {
            if self.execution_dao_facade.exceeds_in_progress_limit(&task) {
                warn!(
                    "Concurrent Execution limited for {}:{}",
                    task_id, task.task_def_name
                );
                self.postpone_quietly(&queue_name, &task);
                return Ok(());
            }

            let task_def = match task.get_task_definition() {
                Some(task_def) => Some(task_def.clone()),
                None => self
                    .metadata_mapper
                    .lookup_task_definition(&task.task_def_name)?,
            };
            if task.rate_limit_per_frequency > 0
                && self
                    .execution_dao_facade
                    .exceeds_rate_limit_per_frequency(&task, task_def.as_ref())
            {
                warn!(
                    "RateLimit Execution limited for {}:{}, limit:{}",
                    task_id, task.task_def_name, task.rate_limit_per_frequency
                );
                self.postpone_quietly(&queue_name, &task);
                return Ok(());
            }
        }

        let workflow_id = task.workflow_instance_id.clone();
        // if we are here the task is updated and needs to be persisted regardless of an error
        let mut has_task_execution_completed = false;
        if let Err(e) = self.execute_task(
            system_task.as_ref(),
            &mut task,
            &queue_name,
            &mut has_task_execution_completed,
        ) {
            Monitors::error("AsyncSystemTaskExecutor", "executeSystemTask");
            error!(
                "Error executing system task - {}, with id: {}, error: {}",
                system_task.task_type(),
                task_id,
                e
            );
        }

        self.execution_dao_facade.update_task(&mut task)?;
        // if the current task execution has completed, then the workflow needs to be evaluated
        if has_task_execution_completed {
            self.executor.decide(&workflow_id)?;
        }
        Ok(())
    }

    fn execute_task(
        &self,
        system_task: &dyn WorkflowSystemTask,
        task: &mut TaskModel,
        queue_name: &str,
        has_task_execution_completed: &mut bool,
    ) -> RegorResult<()> {
        let mut workflow = self
            .execution_dao_facade
            .get_workflow_model(&task.workflow_instance_id, true)?;

        if workflow.status.is_terminal() {
            info!(
                "Workflow {} has been completed for {}/{}",
                workflow.to_short_string(),
                system_task.task_type(),
                task.task_id
            );
            if !task.status.is_terminal() {
                task.set_status(TaskStatus::Canceled);
                task.reason_for_incompletion =
                    format!("Workflow is in {} state", workflow.status.as_ref()).into();
            }
            self.queue_dao.remove(queue_name, &task.task_id)?;
            return Ok(());
        }

        debug!(
            "Executing {}/{} in {} state",
            task.task_type,
            task.task_id,
            task.status.as_ref()
        );

        let is_task_async_complete = system_task.is_async_complete(task);
        if task.status == TaskStatus::Scheduled || !is_task_async_complete {
            task.increment_poll_count();
        }

        if task.status == TaskStatus::Scheduled {
            task.start_time = Utc::now().timestamp_millis();
            Monitors::record_queue_wait_time(&task.task_type, task.get_queue_wait_time());
            system_task.start(&mut workflow, task, &self.executor)?;
        } else if task.status == TaskStatus::InProgress {
            system_task.execute(&mut workflow, task, &self.executor)?;
        }

        // Remove asyncComplete system tasks from the queue that are not in SCHEDULED state
        if is_task_async_complete && task.status != TaskStatus::Scheduled {
            self.queue_dao.remove(queue_name, &task.task_id)?;
            *has_task_execution_completed = true;
        } else if task.status.is_terminal() {
            task.end_time = Utc::now().timestamp_millis();
            self.queue_dao.remove(queue_name, &task.task_id)?;
            *has_task_execution_completed = true;
            debug!("{} removed from queue: {}", task.task_id, queue_name);
        } else {
            let default_offset = self.properties.system_task_callback_time_secs;
            let callback_after_seconds = system_task
                .get_evaluation_offset(task, default_offset)
                .unwrap_or(default_offset);
            task.callback_after_seconds = callback_after_seconds;
            self.queue_dao.postpone(
                queue_name,
                &task.task_id,
                task.workflow_priority,
                callback_after_seconds,
            )?;
            debug!("{} postponed in queue: {}", task.task_id, queue_name);
        }

        debug!(
            "Finished execution of {}/{}-{}",
            system_task.task_type(),
            task.task_id,
            task.status.as_ref()
        );
        Ok(())
    }

    fn postpone_quietly(&self, queue_name: &str, task: &TaskModel) {
        if let Err(e) = self.queue_dao.postpone(
            queue_name,
            &task.task_id,
            task.workflow_priority,
            self.properties.task_execution_postpone_secs,
        ) {
            error!(
                "Error postponing task: {} in queue: {}, error: {}",
                task.task_id, queue_name, e
            );
        }
    }

    fn load_task_quietly(&self, task_id: &str) -> Option<TaskModel> {
        match self.execution_dao_facade.get_task_model(task_id) {
            Ok(task) => task,
            Err(e) => {
                error!("Error loading task: {}, error: {}", task_id, e);
                None
            }
        }
    }
}
