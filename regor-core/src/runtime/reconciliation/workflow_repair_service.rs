use regor_common::prelude::*;

use crate::dao::{QueueDao, DECIDER_QUEUE};
use crate::metrics::Monitors;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::dal::ExecutionDaoFacade;
use crate::runtime::execution::SystemTaskRegistry;
use crate::utils::QueueUtils;

/// Puts back the queue messages lost relative to the persisted state: the decider queue entry
/// of a running workflow, and the task queue entry of a task still waiting to be executed.
pub struct WorkflowRepairService {
    execution_dao_facade: Arc<ExecutionDaoFacade>,
    queue_dao: Arc<dyn QueueDao>,
    system_tasks: Arc<SystemTaskRegistry>,
    workflow_offset_timeout_secs: i64,
}

impl WorkflowRepairService {
    pub fn new(
        execution_dao_facade: Arc<ExecutionDaoFacade>,
        queue_dao: Arc<dyn QueueDao>,
        system_tasks: Arc<SystemTaskRegistry>,
        workflow_offset_timeout_secs: i64,
    ) -> Self {
        Self {
            execution_dao_facade,
            queue_dao,
            system_tasks,
            workflow_offset_timeout_secs,
        }
    }

    /// Verifies the workflow and, if asked, its tasks. Returns true if anything was repaired.
    pub fn verify_and_repair_workflow(
        &self,
        workflow_id: &str,
        include_tasks: bool,
    ) -> RegorResult<bool> {
        let workflow = self
            .execution_dao_facade
            .get_workflow_model(workflow_id, include_tasks)?;
        let mut repaired = self.verify_and_repair_decider_queue(&workflow)?;
        if include_tasks {
            for task in &workflow.tasks {
                repaired |= self.verify_and_repair_task(task)?;
            }
        }
        Ok(repaired)
    }

    /// Verifies the tasks of a running workflow.
    pub fn verify_and_repair_workflow_tasks(&self, workflow_id: &str) -> RegorResult<()> {
        let workflow = self
            .execution_dao_facade
            .get_workflow_model(workflow_id, true)?;
        if workflow.status.is_terminal() {
            return Ok(());
        }
        for task in &workflow.tasks {
            self.verify_and_repair_task(task)?;
        }
        Ok(())
    }

    fn verify_and_repair_decider_queue(&self, workflow: &WorkflowModel) -> RegorResult<bool> {
        if workflow.status.is_terminal()
            || self
                .queue_dao
                .contains_message(DECIDER_QUEUE, &workflow.workflow_id)?
        {
            return Ok(false);
        }
        self.queue_dao.push(
            DECIDER_QUEUE,
            &workflow.workflow_id,
            workflow.priority,
            self.workflow_offset_timeout_secs,
        )?;
        Monitors::record_workflow_repaired(DECIDER_QUEUE);
        info!("Workflow {} pushed back to the decider queue", workflow.workflow_id);
        Ok(true)
    }

    /// Pushes the task back to its queue if it is expected there and missing.
    pub fn verify_and_repair_task(&self, task: &TaskModel) -> RegorResult<bool> {
        if !self.is_task_repairable(task) {
            return Ok(false);
        }
        let task_queue_name = QueueUtils::get_queue_name_by_task_model(task);
        if self
            .queue_dao
            .contains_message(&task_queue_name, &task.task_id)?
        {
            return Ok(false);
        }
        self.queue_dao.push(
            &task_queue_name,
            &task.task_id,
            task.workflow_priority,
            task.callback_after_seconds.max(0),
        )?;
        Monitors::record_workflow_repaired(&task_queue_name);
        info!(
            "Task {} in workflow {} pushed back to queue {}",
            task.task_id, task.workflow_instance_id, task_queue_name
        );
        Ok(true)
    }

    /// SCHEDULED tasks other than the synchronous system tasks sit in a queue, as do the
    /// IN_PROGRESS asynchronous system tasks the engine still has to complete.
    fn is_task_repairable(&self, task: &TaskModel) -> bool {
        let system_task = self.system_tasks.get(&task.task_type);
        match task.status {
            TaskStatus::Scheduled => system_task.map(|x| x.is_async()).unwrap_or(true),
            TaskStatus::InProgress => system_task
                .map(|x| x.is_async() && !x.is_async_complete(task))
                .unwrap_or(false),
            _ => false,
        }
    }
}
