use chrono::Utc;
use linked_hash_map::LinkedHashMap;
use regor_common::prelude::*;
use regor_common::{TaskResult, TaskType, TaskUtils};

use super::decider_service::{DeciderOutcome, DeciderService};
use super::tasks::{SubWorkflow, SystemTaskRegistry, Terminate};
use super::terminate_workflow::TerminateWorkflowInfo;
use super::StartWorkflowInput;
use crate::config::Properties;
use crate::dao::{QueueDao, DECIDER_QUEUE};
use crate::external::WorkflowStatusListener;
use crate::metrics::Monitors;
use crate::model::{TaskModel, TaskStatus, WorkflowModel, WorkflowStatus};
use crate::runtime::dal::ExecutionDaoFacade;
use crate::runtime::metadata::MetadataMapperService;
use crate::runtime::operation::StartWorkflowOperation;
use crate::service::ExecutionLockService;
use crate::utils::{IdGenerator, ParametersUtils, QueueUtils};

const CLASS_NAME: &str = "WorkflowExecutor";
const MAX_REASON_LENGTH: usize = 500;
const FAILURE_WORKFLOW_OUTPUT_KEY: &str = "regor.failure_workflow";
const NO_DOMAIN: &str = "NO_DOMAIN";
const EXPEDITED_PRIORITY: i32 = 0;
const TERMINATE_LOCK_TIME_TO_TRY_MS: u64 = 60_000;

/// Workflow services provider interface: drives workflow instances from start to end.
pub struct WorkflowExecutor {
    decider: Arc<DeciderService>,
    execution_dao_facade: Arc<ExecutionDaoFacade>,
    queue_dao: Arc<dyn QueueDao>,
    metadata_mapper: Arc<MetadataMapperService>,
    system_tasks: Arc<SystemTaskRegistry>,
    execution_lock_service: Arc<ExecutionLockService>,
    workflow_status_listener: Option<Arc<dyn WorkflowStatusListener>>,
    start_workflow_operation: StartWorkflowOperation,
    properties: Arc<Properties>,
}

impl WorkflowExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        decider: Arc<DeciderService>,
        execution_dao_facade: Arc<ExecutionDaoFacade>,
        queue_dao: Arc<dyn QueueDao>,
        metadata_mapper: Arc<MetadataMapperService>,
        system_tasks: Arc<SystemTaskRegistry>,
        execution_lock_service: Arc<ExecutionLockService>,
        workflow_status_listener: Option<Arc<dyn WorkflowStatusListener>>,
        properties: Arc<Properties>,
    ) -> Self {
        let start_workflow_operation = StartWorkflowOperation::new(
            metadata_mapper.clone(),
            execution_dao_facade.clone(),
            execution_lock_service.clone(),
            workflow_status_listener.clone(),
        );
        Self {
            decider,
            execution_dao_facade,
            queue_dao,
            metadata_mapper,
            system_tasks,
            execution_lock_service,
            workflow_status_listener,
            start_workflow_operation,
            properties,
        }
    }

    pub fn execution_dao_facade(&self) -> &Arc<ExecutionDaoFacade> {
        &self.execution_dao_facade
    }

    pub fn system_tasks(&self) -> &Arc<SystemTaskRegistry> {
        &self.system_tasks
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    // ******************************************
    // ************** Workflows *****************
    // ******************************************

    /// Starts a new workflow instance, returns its id.
    pub fn start_workflow(&self, input: StartWorkflowInput) -> RegorResult<InlineStr> {
        self.start_workflow_operation.execute(input, self)
    }

    pub fn get_workflow(&self, workflow_id: &str, include_tasks: bool) -> RegorResult<WorkflowModel> {
        self.execution_dao_facade
            .get_workflow_model(workflow_id, include_tasks)
    }

    pub fn get_task(&self, task_id: &str) -> RegorResult<Option<TaskModel>> {
        self.execution_dao_facade.get_task_model(task_id)
    }

    /// Terminates a running workflow on behalf of a user, its failure workflow is not started.
    pub fn terminate_workflow(&self, workflow_id: &str, reason: &str) -> RegorResult<()> {
        let mut workflow = self
            .execution_dao_facade
            .get_workflow_model(workflow_id, true)?;
        if workflow.status == WorkflowStatus::Completed {
            return fmt_err!(
                Conflict,
                "Cannot terminate a COMPLETED workflow: {}",
                workflow.to_short_string()
            );
        }
        workflow.set_status(WorkflowStatus::Terminated);
        self.terminate_workflow_model(&mut workflow, reason, None)
    }

    pub fn pause_workflow(&self, workflow_id: &str) -> RegorResult<()> {
        if !self
            .execution_lock_service
            .acquire_lock_with_time(workflow_id, TERMINATE_LOCK_TIME_TO_TRY_MS)
        {
            return fmt_err!(
                LockFailed,
                "Error acquiring lock when pausing workflow: {}",
                workflow_id
            );
        }
        let result = self.pause_with_lock(workflow_id);
        self.execution_lock_service.release_lock(workflow_id);
        result
    }

    fn pause_with_lock(&self, workflow_id: &str) -> RegorResult<()> {
        let mut workflow = self
            .execution_dao_facade
            .get_workflow_model(workflow_id, false)?;
        if workflow.status.is_terminal() {
            return fmt_err!(
                Conflict,
                "Workflow {} has ended, status cannot be updated.",
                workflow.to_short_string()
            );
        }
        if workflow.status == WorkflowStatus::Paused {
            // Status is already set to paused
            return Ok(());
        }
        workflow.set_status(WorkflowStatus::Paused);
        self.execution_dao_facade.update_workflow(&mut workflow)?;
        if let Some(listener) = &self.workflow_status_listener {
            listener.on_workflow_paused(&workflow);
        }
        Ok(())
    }

    /// Resumes a paused workflow and decides it right away.
    pub fn resume_workflow(&self, workflow_id: &str) -> RegorResult<()> {
        let mut workflow = self
            .execution_dao_facade
            .get_workflow_model(workflow_id, false)?;
        if workflow.status != WorkflowStatus::Paused {
            return fmt_err!(
                Conflict,
                "The workflow {} is not PAUSED so cannot resume. Current status is {}",
                workflow_id,
                workflow.status.as_ref()
            );
        }

        workflow.set_status(WorkflowStatus::Running);
        // the timeout clock of the workflow restarts
        workflow.last_retried_time = Utc::now().timestamp_millis();
        self.execution_dao_facade.update_workflow(&mut workflow)?;
        self.queue_dao.push_if_not_exists(
            DECIDER_QUEUE,
            workflow_id,
            workflow.priority,
            self.properties.workflow_offset_timeout_secs,
        )?;
        if let Some(listener) = &self.workflow_status_listener {
            listener.on_workflow_resumed(&workflow);
        }
        self.decide(workflow_id)?;
        Ok(())
    }

    /// Makes the scheduled worker tasks of the workflow that wait for their callback delay
    /// visible to the workers right away.
    pub fn reset_callbacks_from_workflow(&self, workflow_id: &str) -> RegorResult<()> {
        let workflow = self
            .execution_dao_facade
            .get_workflow_model(workflow_id, true)?;
        if workflow.status.is_terminal() {
            return fmt_err!(
                Conflict,
                "Workflow is in terminal state. Status = {}",
                workflow.status.as_ref()
            );
        }

        for task in &workflow.tasks {
            if self.system_tasks.is_system_task(&task.task_type)
                || task.status != TaskStatus::Scheduled
                || task.callback_after_seconds <= 0
            {
                continue;
            }
            let queue_name = QueueUtils::get_queue_name_by_task_model(task);
            if self.queue_dao.reset_offset_time(&queue_name, &task.task_id)? {
                let mut task = task.clone();
                task.callback_after_seconds = 0;
                self.execution_dao_facade.update_task(&mut task)?;
                debug!("Callback of task {} in {} reset", task.task_id, queue_name);
            }
        }
        Ok(())
    }

    /// Reruns the failed tasks of a terminal workflow: each of them is replaced by a fresh copy
    /// and the workflow goes back to RUNNING.
    pub fn retry(&self, workflow_id: &str, resume_subworkflow_tasks: bool) -> RegorResult<()> {
        let mut workflow = self
            .execution_dao_facade
            .get_workflow_model(workflow_id, true)?;
        if !workflow.status.is_terminal() {
            return fmt_err!(
                Conflict,
                "Workflow is still running. status={}",
                workflow.status.as_ref()
            );
        }
        if workflow.tasks.is_empty() {
            return str_err!(Conflict, "Workflow has not started yet");
        }

        if resume_subworkflow_tasks {
            if let Some(index) = workflow.tasks.iter().rposition(|x| {
                x.task_type == TaskType::SubWorkflow.as_ref()
                    && !x.status.is_successful()
                    && !x.sub_workflow_id.is_empty()
            }) {
                return self.retry_last_failed_sub_workflow(&mut workflow, index);
            }
        }

        // Get all FAILED or CANCELED tasks that are not COMPLETED (or reach other terminal states)
        // on further executions.
        let mut retriable: LinkedHashMap<InlineStr, usize> = LinkedHashMap::new();
        let mut reopened = Vec::new();
        for (index, task) in workflow.tasks.iter_mut().enumerate() {
            match task.status {
                TaskStatus::Failed | TaskStatus::FailedWithTerminalError | TaskStatus::TimedOut => {
                    retriable.insert(task.reference_task_name.clone(), index);
                }
                TaskStatus::Canceled => {
                    if task.task_type == TaskType::Join.as_ref()
                        || task.task_type == TaskType::DoWhile.as_ref()
                    {
                        // evaluated again along with the retried tasks
                        task.set_status(TaskStatus::InProgress);
                        task.executed = false;
                        reopened.push(index);
                    } else {
                        retriable.insert(task.reference_task_name.clone(), index);
                    }
                }
                _ => {
                    retriable.remove(&task.reference_task_name);
                }
            }
        }

        if retriable.is_empty() && workflow.status != WorkflowStatus::TimedOut {
            return str_err!(
                Conflict,
                "There are no retryable tasks! Use restart if you want to attempt entire workflow execution again."
            );
        }

        workflow.set_status(WorkflowStatus::Running);
        workflow.last_retried_time = Utc::now().timestamp_millis();
        workflow.reason_for_incompletion = InlineStr::new();
        workflow.failed_task_id = InlineStr::new();
        workflow.end_time = 0;

        let mut rescheduled_tasks = Vec::new();
        for (_, index) in retriable {
            let rescheduled = self.task_to_be_rescheduled(&workflow, &workflow.tasks[index])?;
            let task = &mut workflow.tasks[index];
            task.retried = true;
            // since this task is being retried and a retry has been computed, task lifecycle is
            // complete
            task.executed = true;
            reopened.push(index);
            rescheduled_tasks.push(rescheduled);
        }

        for index in reopened {
            let mut task = workflow.tasks[index].clone();
            self.persist_task(&mut task)?;
            if task.status == TaskStatus::InProgress {
                self.add_task_to_queue(&task)?;
            }
            workflow.tasks[index] = task;
        }

        self.execution_dao_facade.update_workflow(&mut workflow)?;
        if let Some(listener) = &self.workflow_status_listener {
            listener.on_workflow_retried(&workflow);
        }

        self.set_task_domains(&mut rescheduled_tasks, &workflow);
        let (new_task_ids, _) = self.dedup_and_add_tasks(&mut workflow, rescheduled_tasks);
        self.schedule_task(&mut workflow, &new_task_ids)?;
        self.execution_dao_facade.update_workflow(&mut workflow)?;

        if workflow.has_parent() {
            self.update_and_push_parents(&workflow, "retried")?;
        }
        self.queue_dao.push_if_not_exists(
            DECIDER_QUEUE,
            workflow_id,
            workflow.priority,
            self.properties.workflow_offset_timeout_secs,
        )?;
        self.decide(workflow_id)?;
        Ok(())
    }

    fn retry_last_failed_sub_workflow(
        &self,
        workflow: &mut WorkflowModel,
        index: usize,
    ) -> RegorResult<()> {
        let sub_workflow_id = workflow.tasks[index].sub_workflow_id.clone();
        info!(
            "Retrying sub workflow {} of workflow {}",
            sub_workflow_id, workflow.workflow_id
        );
        // the sub workflow retry puts the parent back in RUNNING
        self.retry(&sub_workflow_id, true)
    }

    /// Marks the SUB_WORKFLOW task of every ancestor IN_PROGRESS again and brings the ancestors
    /// back to RUNNING, after an operation restarted a finished sub workflow.
    fn update_and_push_parents(&self, workflow: &WorkflowModel, operation: &str) -> RegorResult<()> {
        let mut current = workflow.clone();
        while current.has_parent() {
            let mut parent = self
                .execution_dao_facade
                .get_workflow_model(&current.parent_workflow_id, false)?;
            if let Some(mut parent_task) = self
                .execution_dao_facade
                .get_task_model(&current.parent_workflow_task_id)?
            {
                parent_task.set_status(TaskStatus::InProgress);
                parent_task.sub_workflow_id = current.workflow_id.clone();
                parent_task.sub_workflow_changed = true;
                parent_task.executed = false;
                parent_task.reason_for_incompletion = InlineStr::new();
                parent_task.end_time = 0;
                self.execution_dao_facade.update_task(&mut parent_task)?;
                self.add_task_to_queue(&parent_task)?;
            }

            if parent.status.is_terminal() {
                parent.set_status(WorkflowStatus::Running);
                parent.reason_for_incompletion = InlineStr::new();
                parent.end_time = 0;
                parent.last_retried_time = Utc::now().timestamp_millis();
                self.execution_dao_facade.update_workflow(&mut parent)?;
            }
            info!(
                "Parent workflow {} of {} updated after the sub workflow was {}",
                parent.workflow_id, current.workflow_id, operation
            );
            self.expedite_lazy_workflow_evaluation(&parent.workflow_id, parent.priority)?;
            current = parent;
        }
        Ok(())
    }

    fn task_to_be_rescheduled(
        &self,
        workflow: &WorkflowModel,
        task: &TaskModel,
    ) -> RegorResult<TaskModel> {
        let mut task_to_be_retried = task.clone();
        task_to_be_retried.task_id = IdGenerator::generate();
        task_to_be_retried.retried_task_id = task.task_id.clone();
        task_to_be_retried.set_status(TaskStatus::Scheduled);
        task_to_be_retried.retry_count = task.retry_count + 1;
        task_to_be_retried.retried = false;
        task_to_be_retried.executed = false;
        task_to_be_retried.poll_count = 0;
        task_to_be_retried.callback_after_seconds = 0;
        task_to_be_retried.sub_workflow_id = InlineStr::new();
        task_to_be_retried.scheduled_time = Utc::now().timestamp_millis();
        task_to_be_retried.start_time = 0;
        task_to_be_retried.end_time = 0;
        task_to_be_retried.update_time = 0;
        task_to_be_retried.worker_id = InlineStr::new();
        task_to_be_retried.reason_for_incompletion = InlineStr::new();
        task_to_be_retried.seq = 0;
        task_to_be_retried.output_data.clear();
        task_to_be_retried.external_output_payload_storage_path = InlineStr::new();

        // perform parameter replacement for retried task
        if let Some(workflow_task) = &task.workflow_task {
            let task_input = ParametersUtils::get_task_input(
                &workflow_task.input_parameters,
                workflow,
                task.get_task_definition(),
                Some(&task_to_be_retried.task_id),
            )?;
            task_to_be_retried.input_data.extend(task_input);
        }
        Ok(task_to_be_retried)
    }

    /// Reruns a terminal workflow from the beginning, dropping its task history.
    pub fn restart(&self, workflow_id: &str, use_latest_definitions: bool) -> RegorResult<()> {
        let mut workflow = self
            .execution_dao_facade
            .get_workflow_model(workflow_id, true)?;
        if !workflow.status.is_terminal() {
            return fmt_err!(
                Conflict,
                "Workflow is still running. status={}",
                workflow.status.as_ref()
            );
        }

        if use_latest_definitions {
            let mut latest = self
                .metadata_mapper
                .lookup_for_workflow_definition(&workflow.workflow_definition.name, None)?
                .as_ref()
                .clone();
            self.metadata_mapper.populate_task_definitions(&mut latest)?;
            workflow.workflow_definition = Arc::new(latest);
        }
        if !workflow.workflow_definition.restartable {
            return fmt_err!(
                Conflict,
                "Workflow {} is not restartable",
                workflow.to_short_string()
            );
        }

        // Remove the tasks
        for task in workflow.tasks.drain(..) {
            let queue_name = QueueUtils::get_queue_name_by_task_model(&task);
            if let Err(e) = self.queue_dao.remove(&queue_name, &task.task_id) {
                warn!("Error removing task {} from queue {}: {}", task.task_id, queue_name, e);
            }
            self.execution_dao_facade.remove_task(&task.task_id)?;
        }

        let now = Utc::now().timestamp_millis();
        workflow.set_status(WorkflowStatus::Running);
        workflow.reason_for_incompletion = InlineStr::new();
        workflow.failed_task_id = InlineStr::new();
        workflow.failed_reference_task_names.clear();
        workflow.failed_task_names.clear();
        workflow.create_time = now;
        workflow.end_time = 0;
        workflow.last_retried_time = 0;
        workflow.output.clear();
        workflow.external_output_payload_storage_path = InlineStr::new();
        workflow.variables = workflow.workflow_definition.variables.clone();
        self.execution_dao_facade.update_workflow(&mut workflow)?;

        self.queue_dao.push_if_not_exists(
            DECIDER_QUEUE,
            workflow_id,
            workflow.priority,
            self.properties.workflow_offset_timeout_secs,
        )?;
        if let Some(listener) = &self.workflow_status_listener {
            listener.on_workflow_restarted(&workflow);
        }
        self.decide(workflow_id)?;

        if workflow.has_parent() {
            self.update_and_push_parents(&workflow, "restarted")?;
        }
        Ok(())
    }

    // ******************************************
    // **************** Tasks *******************
    // ******************************************

    /// Applies the result reported by a worker to its task, then decides the workflow.
    pub fn update_task(&self, task_result: TaskResult) -> RegorResult<()> {
        if task_result.extend_lease {
            return self.extend_lease(&task_result);
        }

        let workflow_id = task_result.workflow_instance_id.clone();
        let workflow = self
            .execution_dao_facade
            .get_workflow_model(&workflow_id, false)?;
        let mut task = self
            .execution_dao_facade
            .get_task_model(&task_result.task_id)?
            .ok_or_else(|| {
                ErrorCode::NotFound(format!("No such task found by id: {}", task_result.task_id))
            })?;

        debug!(
            "Task: {} belonging to Workflow {} being updated",
            task.task_id,
            workflow.to_short_string()
        );

        let task_queue_name = QueueUtils::get_queue_name_by_task_model(&task);

        if task.status.is_terminal() {
            // Task was already updated....
            self.queue_dao.remove(&task_queue_name, &task_result.task_id)?;
            info!(
                "Task: {} has already finished execution with status: {} within workflow: {}. Removed task from queue: {}",
                task.task_id,
                task.status.as_ref(),
                workflow.workflow_id,
                task_queue_name
            );
            Monitors::record_update_conflict(
                &task.task_type,
                &workflow.workflow_definition.name,
                task.status,
            );
            return Ok(());
        }

        if workflow.status.is_terminal() {
            // Workflow is in terminal state
            self.queue_dao.remove(&task_queue_name, &task_result.task_id)?;
            info!(
                "Workflow: {} has already finished execution. Task update for: {} ignored and removed from Queue: {}.",
                workflow.to_short_string(),
                task_result.task_id,
                task_queue_name
            );
            Monitors::record_workflow_update_conflict(
                &workflow.workflow_definition.name,
                workflow.status,
            );
            return Ok(());
        }

        // for system tasks, setting to SCHEDULED would mean restarting the task which is
        // undesirable for worker tasks, set status to SCHEDULED and push to the queue
        let status = TaskStatus::from(task_result.status);
        if !self.system_tasks.is_system_task(&task.task_type) && status == TaskStatus::InProgress {
            task.set_status(TaskStatus::Scheduled);
        } else {
            task.set_status(status);
        }
        task.output_data = task_result.output_data;
        task.external_output_payload_storage_path =
            task_result.external_output_payload_storage_path;
        task.reason_for_incompletion = Self::truncate_reason(&task_result.reason_for_incompletion);
        task.worker_id = task_result.worker_id;
        task.callback_after_seconds = task_result.callback_after_seconds;
        if !task_result.sub_workflow_id.is_empty() {
            task.sub_workflow_id = task_result.sub_workflow_id;
        }
        if task.status.is_terminal() {
            task.end_time = Utc::now().timestamp_millis();
        }

        // Update message in Task queue based on Task status
        let queue_result = match task.status {
            TaskStatus::Completed
            | TaskStatus::CompletedWithErrors
            | TaskStatus::Canceled
            | TaskStatus::Failed
            | TaskStatus::FailedWithTerminalError
            | TaskStatus::TimedOut => self.queue_dao.remove(&task_queue_name, &task.task_id),
            TaskStatus::InProgress | TaskStatus::Scheduled => self
                .queue_dao
                .postpone(
                    &task_queue_name,
                    &task.task_id,
                    task.workflow_priority,
                    task.callback_after_seconds,
                )
                .map(|_| ()),
            TaskStatus::Skipped => Ok(()),
        };
        if let Err(e) = queue_result {
            Monitors::record_task_queue_op_error(&task.task_type, &workflow.workflow_definition.name);
            error!(
                "Error updating the queue {} for task: {}, error: {}",
                task_queue_name, task.task_id, e
            );
            return Err(ErrorCode::Transient(format!(
                "Error updating the queue {} for task: {}",
                task_queue_name, task.task_id
            )));
        }

        if let Err(e) = self.execution_dao_facade.update_task(&mut task) {
            Monitors::record_task_update_error(&task.task_type, &workflow.workflow_definition.name);
            error!("Error updating task: {}, error: {}", task.task_id, e);
            return Err(e);
        }

        for log in &task_result.logs {
            debug!("Task {} log: {:?}", task.task_id, log);
        }

        // Record
        if task.status.is_terminal() {
            let duration = self.get_task_duration(0, &task);
            let last_duration = task.end_time - task.start_time;
            Monitors::record_task_execution_time(&task.task_def_name, duration, true, task.status);
            Monitors::record_task_execution_time(
                &task.task_def_name,
                last_duration,
                false,
                task.status,
            );
        }

        self.decide(&workflow_id)?;
        Ok(())
    }

    fn extend_lease(&self, task_result: &TaskResult) -> RegorResult<()> {
        let mut task = self
            .execution_dao_facade
            .get_task_model(&task_result.task_id)?
            .ok_or_else(|| {
                ErrorCode::NotFound(format!("No such task found by id: {}", task_result.task_id))
            })?;

        if task.status.is_terminal() {
            info!(
                "Task: {} is already terminal, lease not extended",
                task_result.task_id
            );
            return Ok(());
        }
        if let Err(e) = self.execution_dao_facade.extend_lease(&mut task) {
            Monitors::record_task_extend_lease_error(&task.task_type, &task.workflow_type);
            error!("Error extending lease for task: {}, error: {}", task.task_id, e);
            return Err(e);
        }
        Ok(())
    }

    /// Sum of the durations of a task and of all its previous attempts.
    fn get_task_duration(&self, s: i64, task: &TaskModel) -> i64 {
        let duration = task.end_time - task.start_time;
        let s = s + duration;
        if task.retried_task_id.is_empty() {
            return s;
        }
        match self.execution_dao_facade.get_task_model(&task.retried_task_id) {
            Ok(Some(retried_task)) => self.get_task_duration(s, &retried_task),
            _ => s,
        }
    }

    // ******************************************
    // **************** Decide ******************
    // ******************************************

    /// Decides the workflow under its lock. Returns `None` if the lock could not be acquired.
    pub fn decide(&self, workflow_id: &str) -> RegorResult<Option<WorkflowModel>> {
        if !self.execution_lock_service.acquire_lock(workflow_id) {
            return Ok(None);
        }

        let result = self.load_and_decide(workflow_id);
        self.execution_lock_service.release_lock(workflow_id);
        if let Ok(workflow) = &result {
            if workflow.status.is_terminal() {
                self.execution_lock_service.delete_lock(workflow_id);
            }
        }
        result.map(Some)
    }

    fn load_and_decide(&self, workflow_id: &str) -> RegorResult<WorkflowModel> {
        // If it is a new workflow, the tasks will be still empty even though include tasks is true
        let mut workflow = self
            .execution_dao_facade
            .get_workflow_model(workflow_id, true)?;
        self.decide_with_lock(&mut workflow)?;
        Ok(workflow)
    }

    /// Decides the workflow until it reaches a stable state. The caller holds its lock.
    pub fn decide_with_lock(&self, workflow: &mut WorkflowModel) -> RegorResult<()> {
        if workflow.status.is_terminal() {
            if !workflow.status.is_successful() {
                self.cancel_non_terminal_tasks(workflow);
            }
            return Ok(());
        }

        loop {
            let outcome = self.decider.decide(workflow)?;
            match self.apply_outcome(workflow, outcome) {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(e) if e.is_terminate_workflow() => {
                    return self.terminate(workflow, TerminateWorkflowInfo::from_error(&e));
                }
                Err(e) => {
                    error!(
                        "Error deciding workflow: {}, error: {}",
                        workflow.workflow_id, e
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Carries out one decide outcome. Returns true when the state changed and the workflow has
    /// to be decided again.
    fn apply_outcome(&self, workflow: &mut WorkflowModel, outcome: DeciderOutcome) -> RegorResult<bool> {
        if let Some(info) = outcome.terminate {
            self.terminate(workflow, info)?;
            return Ok(false);
        }
        if outcome.is_complete {
            self.persist_tasks(workflow, &outcome.tasks_to_be_updated)?;
            self.end_execution(workflow, outcome.terminate_task.as_deref())?;
            return Ok(false);
        }

        let mut tasks_to_be_scheduled = outcome.tasks_to_be_scheduled;
        self.set_task_domains(&mut tasks_to_be_scheduled, workflow);
        let mut tasks_to_be_updated = outcome.tasks_to_be_updated;
        let (new_task_ids, outcome_task_ids) =
            self.dedup_and_add_tasks(workflow, tasks_to_be_scheduled);

        let mut state_changed = self.schedule_task(workflow, &new_task_ids)?;

        for task_id in &outcome_task_ids {
            let index = match workflow.tasks.iter().position(|x| &x.task_id == task_id) {
                Some(index) => index,
                None => continue,
            };
            if workflow.tasks[index].status.is_terminal() {
                continue;
            }
            let system_task = match self.system_tasks.get(&workflow.tasks[index].task_type) {
                Some(system_task) if !system_task.is_async() => system_task,
                _ => continue,
            };

            let mut task = workflow.tasks[index].clone();
            let executed = system_task.execute(workflow, &mut task, self);
            // the body of a loop may have been appended, the task keeps its position
            workflow.tasks[index] = task;
            if executed? {
                if !tasks_to_be_updated.contains(task_id) {
                    tasks_to_be_updated.push(task_id.clone());
                }
                state_changed = true;
            }
        }

        let changed = !tasks_to_be_updated.is_empty() || !new_task_ids.is_empty();
        self.persist_tasks(workflow, &tasks_to_be_updated)?;
        if changed || state_changed {
            self.execution_dao_facade.update_workflow(workflow)?;
        }
        Ok(state_changed)
    }

    /// Adds the tasks not yet in the workflow, by task key. Returns the ids of the added tasks
    /// and the ids of the workflow tasks matching every given task.
    fn dedup_and_add_tasks(
        &self,
        workflow: &mut WorkflowModel,
        tasks: Vec<TaskModel>,
    ) -> (Vec<InlineStr>, Vec<InlineStr>) {
        let mut existing: HashMap<InlineStr, InlineStr> = workflow
            .tasks
            .iter()
            .map(|x| (x.get_task_key(), x.task_id.clone()))
            .collect();

        let mut new_task_ids = Vec::new();
        let mut task_ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            let task_key = task.get_task_key();
            match existing.get(&task_key) {
                Some(task_id) => task_ids.push(task_id.clone()),
                None => {
                    existing.insert(task_key, task.task_id.clone());
                    new_task_ids.push(task.task_id.clone());
                    task_ids.push(task.task_id.clone());
                    workflow.tasks.push(task);
                }
            }
        }
        (new_task_ids, task_ids)
    }

    /// Persists the tasks newly added to the workflow, starts the synchronous system tasks among
    /// them and queues the others. Returns true if a system task was started.
    fn schedule_task(&self, workflow: &mut WorkflowModel, task_ids: &[InlineStr]) -> RegorResult<bool> {
        if task_ids.is_empty() {
            return Ok(false);
        }

        // Get the highest seq number
        let mut count = workflow.tasks.iter().map(|x| x.seq).max().unwrap_or(0);
        for task in workflow.tasks.iter_mut() {
            if task.seq == 0 && task_ids.contains(&task.task_id) {
                count += 1;
                task.seq = count;
            }
        }

        Monitors::record_num_tasks_in_workflow(
            workflow.tasks.len(),
            &workflow.workflow_definition.name,
            workflow.workflow_definition.version,
        );

        // Save the tasks in the DAO
        let mut tasks = task_ids
            .iter()
            .filter_map(|x| workflow.get_task_by_id(x).cloned())
            .collect::<Vec<_>>();
        let created_task_ids = match self.execution_dao_facade.create_tasks(&mut tasks) {
            Ok(created) => created.into_iter().map(|x| x.task_id).collect::<HashSet<_>>(),
            Err(e) => {
                let message = format!(
                    "Error scheduling tasks: {:?}, for workflow: {}",
                    task_ids, workflow.workflow_id
                );
                error!("{}, error: {}", message, e);
                Monitors::error(CLASS_NAME, "scheduleTask");
                return Err(ErrorCode::TerminateWorkflow(message));
            }
        };

        let mut started_system_tasks = false;
        let mut tasks_to_be_queued = Vec::new();
        for task_id in task_ids.iter().filter(|x| created_task_ids.contains(*x)) {
            let index = match workflow.tasks.iter().position(|x| &x.task_id == task_id) {
                Some(index) => index,
                None => continue,
            };
            match self.system_tasks.get(&workflow.tasks[index].task_type) {
                Some(system_task) if !system_task.is_async() => {
                    let mut task = workflow.tasks[index].clone();
                    task.start_time = Utc::now().timestamp_millis();
                    system_task.start(workflow, &mut task, self)?;
                    started_system_tasks = true;
                    self.persist_task(&mut task)?;
                    workflow.tasks[index] = task;
                }
                _ => tasks_to_be_queued.push(workflow.tasks[index].clone()),
            }
        }

        for task in &tasks_to_be_queued {
            if let Err(e) = self.add_task_to_queue(task) {
                let message = format!(
                    "Error pushing tasks to the queue: {:?}, for workflow: {}",
                    tasks_to_be_queued
                        .iter()
                        .map(|x| &x.task_id)
                        .collect::<Vec<_>>(),
                    workflow.workflow_id
                );
                error!("{}, error: {}", message, e);
                Monitors::error(CLASS_NAME, "scheduleTask");
                return Err(ErrorCode::TerminateWorkflow(message));
            }
        }
        Ok(started_system_tasks)
    }

    /// Maps the first task of the loop body of a DO_WHILE task for its current iteration and
    /// schedules it.
    pub fn schedule_next_iteration(
        &self,
        do_while_task: &TaskModel,
        workflow: &mut WorkflowModel,
    ) -> RegorResult<()> {
        let first_task = do_while_task
            .workflow_task
            .as_ref()
            .and_then(|x| x.loop_over.first())
            .ok_or_else(|| {
                ErrorCode::TerminateWorkflow(format!(
                    "DO_WHILE task {} has no tasks to loop over",
                    do_while_task.reference_task_name
                ))
            })?
            .clone();

        let mut tasks_to_be_scheduled =
            self.decider
                .get_tasks_to_be_scheduled(workflow, &first_task, do_while_task.retry_count)?;
        for task in tasks_to_be_scheduled.iter_mut() {
            TaskUtils::append_iteration(&mut task.reference_task_name, do_while_task.iteration);
            task.iteration = do_while_task.iteration;
        }
        self.set_task_domains(&mut tasks_to_be_scheduled, workflow);
        let (new_task_ids, _) = self.dedup_and_add_tasks(workflow, tasks_to_be_scheduled);
        self.schedule_task(workflow, &new_task_ids)?;
        Ok(())
    }

    pub fn add_task_to_queue(&self, task: &TaskModel) -> RegorResult<()> {
        // put in queue
        let task_queue_name = QueueUtils::get_queue_name_by_task_model(task);
        self.queue_dao.push(
            &task_queue_name,
            &task.task_id,
            task.workflow_priority,
            task.callback_after_seconds.max(0),
        )?;
        debug!(
            "Added task {} with priority {} to queue {} with call back seconds {}",
            task.task_id, task.workflow_priority, task_queue_name, task.callback_after_seconds
        );
        Ok(())
    }

    /// Sets the domain of the worker tasks from the task-to-domain mapping of the workflow, the
    /// `*` entry applying to every task.
    fn set_task_domains(&self, tasks: &mut [TaskModel], workflow: &WorkflowModel) {
        if workflow.task_to_domain.is_empty() {
            return;
        }
        let wildcard = workflow.task_to_domain.get("*");
        for task in tasks.iter_mut() {
            if self.system_tasks.is_system_task(&task.task_type) {
                continue;
            }
            let domains = wildcard.or_else(|| workflow.task_to_domain.get(&task.task_def_name));
            if let Some(domains) = domains {
                task.domain = Self::get_active_domain(domains);
            }
        }
    }

    /// The first domain of a comma separated list, none if it is `NO_DOMAIN`.
    fn get_active_domain(domains: &str) -> InlineStr {
        match domains.split(',').map(|x| x.trim()).find(|x| !x.is_empty()) {
            Some(domain) if !domain.eq_ignore_ascii_case(NO_DOMAIN) => domain.into(),
            _ => InlineStr::new(),
        }
    }

    fn persist_tasks(&self, workflow: &mut WorkflowModel, task_ids: &[InlineStr]) -> RegorResult<()> {
        for task_id in task_ids {
            if let Some(task) = workflow.get_task_by_id_mut(task_id) {
                self.persist_task(task)?;
            }
        }
        Ok(())
    }

    /// Persists a copy of the task, the payloads of the given one stay in memory.
    fn persist_task(&self, task: &mut TaskModel) -> RegorResult<()> {
        let mut stored = task.clone();
        self.execution_dao_facade.update_task(&mut stored)?;
        task.update_time = stored.update_time;
        task.end_time = stored.end_time;
        if stored.status != task.status {
            // a payload over the hard limit fails the task
            task.status = stored.status;
            task.reason_for_incompletion = stored.reason_for_incompletion;
        }
        Ok(())
    }

    // ******************************************
    // ************* Completion *****************
    // ******************************************

    fn end_execution(&self, workflow: &mut WorkflowModel, terminate_task_id: Option<&str>) -> RegorResult<()> {
        let terminate_task = terminate_task_id.and_then(|x| workflow.get_task_by_id(x).cloned());
        match terminate_task {
            Some(terminate_task) => {
                let termination_status = terminate_task
                    .input_data
                    .get(Terminate::TERMINATION_STATUS_PARAMETER)
                    .map(|x| x.to_string())
                    .unwrap_or_default();
                let reason = match terminate_task
                    .input_data
                    .get(Terminate::TERMINATION_REASON_PARAMETER)
                    .map(|x| x.to_string())
                {
                    Some(reason) if !reason.is_empty() => reason,
                    _ => format!(
                        "Workflow is {} by TERMINATE task: {}",
                        termination_status, terminate_task.task_id
                    )
                    .into(),
                };

                if termination_status.as_str() == WorkflowStatus::Failed.as_ref() {
                    workflow.set_status(WorkflowStatus::Failed);
                    self.terminate(
                        workflow,
                        TerminateWorkflowInfo::new(
                            reason,
                            WorkflowStatus::Failed,
                            Some(terminate_task),
                        ),
                    )?;
                } else {
                    workflow.reason_for_incompletion = Self::truncate_reason(&reason);
                    self.complete_workflow(workflow)?;
                }
            }
            None => self.complete_workflow(workflow)?,
        }
        self.cancel_non_terminal_tasks(workflow);
        Ok(())
    }

    fn complete_workflow(&self, workflow: &mut WorkflowModel) -> RegorResult<()> {
        debug!("Completing workflow execution for {}", workflow.workflow_id);

        if workflow.status == WorkflowStatus::Completed {
            self.queue_dao.remove(DECIDER_QUEUE, &workflow.workflow_id)?;
            self.execution_dao_facade.remove_from_pending_workflow(
                &workflow.workflow_definition.name,
                &workflow.workflow_id,
            )?;
            debug!("Workflow: {} has already been completed.", workflow.workflow_id);
            return Ok(());
        }

        if workflow.status.is_terminal() {
            return fmt_err!(
                Conflict,
                "Workflow is in terminal state. Status: {}",
                workflow.status.as_ref()
            );
        }

        self.decider.update_workflow_output(workflow, None)?;
        workflow.set_status(WorkflowStatus::Completed);
        Self::set_failed_task_names(workflow);
        self.execution_dao_facade.update_workflow(workflow)?;
        self.queue_dao.remove(DECIDER_QUEUE, &workflow.workflow_id)?;
        debug!("Completed workflow execution for {}", workflow.workflow_id);
        self.notify_workflow_status_listener(workflow, |listener, workflow| {
            listener.on_workflow_completed(workflow)
        });
        Monitors::record_workflow_completion(
            &workflow.workflow_definition.name,
            workflow.end_time - workflow.create_time,
            &workflow.owner_app,
        );

        if workflow.has_parent() {
            self.update_parent_workflow_task(workflow)?;
            info!(
                "{} updated parent {} task {}",
                workflow.to_short_string(),
                workflow.parent_workflow_id,
                workflow.parent_workflow_task_id
            );
        }
        self.execution_dao_facade.remove_from_pending_workflow(
            &workflow.workflow_definition.name,
            &workflow.workflow_id,
        )
    }

    fn set_failed_task_names(workflow: &mut WorkflowModel) {
        let failed_tasks = workflow
            .tasks
            .iter()
            .filter(|x| {
                x.status == TaskStatus::Failed || x.status == TaskStatus::FailedWithTerminalError
            })
            .map(|x| (x.reference_task_name.clone(), x.task_def_name.clone()))
            .collect::<Vec<_>>();
        for (reference_task_name, task_def_name) in failed_tasks {
            workflow.failed_reference_task_names.insert(reference_task_name);
            workflow.failed_task_names.insert(task_def_name);
        }
    }

    /// Terminates the workflow as the decide pass asked, persisting the task that caused it and
    /// starting the failure workflow of the definition.
    fn terminate(&self, workflow: &mut WorkflowModel, info: TerminateWorkflowInfo) -> RegorResult<()> {
        if !workflow.status.is_terminal() {
            workflow.set_status(info.status);
        }

        if let Some(mut task) = info.task {
            if workflow.failed_task_id.is_empty() {
                workflow.failed_task_id = task.task_id.clone();
            }
            self.persist_task(&mut task)?;
            if let Some(existing) = workflow.get_task_by_id_mut(&task.task_id) {
                *existing = task;
            }
        }

        let failure_workflow = self.resolve_failure_workflow(workflow);
        self.terminate_workflow_model(workflow, &info.reason, failure_workflow.as_deref())
    }

    /// The failure workflow of the definition. A `${...}` or `$.path` value is resolved from the
    /// workflow input.
    fn resolve_failure_workflow(&self, workflow: &WorkflowModel) -> Option<InlineStr> {
        let failure_workflow = workflow.workflow_definition.failure_workflow.trim();
        if failure_workflow.is_empty() {
            return None;
        }

        let resolved = if failure_workflow.starts_with("${") {
            let template = object_map! { "failureWorkflow" => failure_workflow };
            ParametersUtils::replace_with_workflow(&template, workflow)
                .remove("failureWorkflow")
                .filter(|x| !x.is_null())
                .map(|x| x.to_string())
        } else if let Some(path) = failure_workflow.strip_prefix("$.") {
            let mut components = path.split('.');
            let mut value = components
                .next()
                .and_then(|x| workflow.input.get(x))
                .cloned();
            for component in components {
                value = value
                    .as_ref()
                    .and_then(|x| x.as_map())
                    .and_then(|x| x.get(component))
                    .cloned();
            }
            value.filter(|x| !x.is_null()).map(|x| x.to_string())
        } else {
            Some(failure_workflow.into())
        };

        if resolved.is_none() {
            warn!(
                "Failure workflow {} of {} could not be resolved from the workflow input",
                failure_workflow,
                workflow.to_short_string()
            );
        }
        resolved.filter(|x| !x.trim().is_empty())
    }

    fn terminate_workflow_model(
        &self,
        workflow: &mut WorkflowModel,
        reason: &str,
        failure_workflow: Option<&str>,
    ) -> RegorResult<()> {
        let workflow_id = workflow.workflow_id.clone();
        if !self
            .execution_lock_service
            .acquire_lock_with_time(&workflow_id, TERMINATE_LOCK_TIME_TO_TRY_MS)
        {
            return fmt_err!(
                LockFailed,
                "Error acquiring lock when terminating workflow: {}",
                workflow_id
            );
        }

        let result = self.terminate_with_lock(workflow, reason, failure_workflow);
        self.execution_lock_service.release_lock(&workflow_id);
        self.execution_lock_service.delete_lock(&workflow_id);
        result
    }

    fn terminate_with_lock(
        &self,
        workflow: &mut WorkflowModel,
        reason: &str,
        failure_workflow: Option<&str>,
    ) -> RegorResult<()> {
        if !workflow.status.is_terminal() {
            workflow.set_status(WorkflowStatus::Terminated);
        }

        if let Err(e) = self.decider.update_workflow_output(workflow, None) {
            // catch any failure in this step and continue the execution of terminating workflow
            error!(
                "Failed to update output data for workflow: {}, error: {}",
                workflow.workflow_id, e
            );
            Monitors::error(CLASS_NAME, "terminateWorkflow");
        }

        Self::set_failed_task_names(workflow);
        workflow.reason_for_incompletion = Self::truncate_reason(reason);
        self.execution_dao_facade.update_workflow(workflow)?;
        self.notify_workflow_status_listener(workflow, |listener, workflow| {
            listener.on_workflow_terminated(workflow)
        });
        Monitors::record_workflow_termination(
            &workflow.workflow_definition.name,
            workflow.status,
            &workflow.owner_app,
        );
        info!(
            "Workflow {} is terminated because of {}",
            workflow.workflow_id, workflow.reason_for_incompletion
        );

        // Remove from the task queue if they were there
        for task in &workflow.tasks {
            let queue_name = QueueUtils::get_queue_name_by_task_model(task);
            if let Err(e) = self.queue_dao.remove(&queue_name, &task.task_id) {
                warn!(
                    "Error removing task {} from queue {}: {}",
                    task.task_id, queue_name, e
                );
            }
        }

        if workflow.has_parent() {
            self.update_parent_workflow_task(workflow)?;
            info!(
                "{} updated parent {} task {}",
                workflow.to_short_string(),
                workflow.parent_workflow_id,
                workflow.parent_workflow_task_id
            );
        }

        if let Some(failure_workflow) = failure_workflow {
            let failed_workflow = object_map! {
                "workflowId" => &workflow.workflow_id,
                "workflowType" => &workflow.workflow_definition.name,
                "version" => workflow.workflow_definition.version,
                "status" => workflow.status.as_ref(),
                "reasonForIncompletion" => &workflow.reason_for_incompletion,
                "correlationId" => &workflow.correlation_id,
                "input" => workflow.input.clone(),
                "output" => workflow.output.clone(),
            };
            let mut input = workflow.input.clone();
            input.insert("workflowId".into(), (&workflow.workflow_id).into());
            input.insert("reason".into(), (&workflow.reason_for_incompletion).into());
            input.insert("failureStatus".into(), workflow.status.as_ref().into());
            input.insert("failureTaskId".into(), (&workflow.failed_task_id).into());
            input.insert("failedWorkflow".into(), failed_workflow.into());

            let mut start_input = StartWorkflowInput::new(failure_workflow.into(), input);
            start_input.correlation_id = workflow.correlation_id.clone();
            start_input.task_to_domain = workflow.task_to_domain.clone();
            start_input.triggering_workflow_id = workflow.workflow_id.clone();

            let output = match self.start_workflow(start_input) {
                Ok(failure_workflow_id) => Object::from(failure_workflow_id),
                Err(e) => {
                    error!("Failed to start error workflow: {}", e);
                    Monitors::error(CLASS_NAME, "startFailureWorkflow");
                    Object::from(format!(
                        "Error starting failure workflow {}: {}",
                        failure_workflow,
                        e.display_text()
                    ))
                }
            };
            workflow
                .output
                .insert(FAILURE_WORKFLOW_OUTPUT_KEY.into(), output);
            self.execution_dao_facade.update_workflow(workflow)?;
        }
        self.execution_dao_facade.remove_from_pending_workflow(
            &workflow.workflow_definition.name,
            &workflow.workflow_id,
        )?;

        let errors = self.cancel_non_terminal_tasks(workflow);
        if !errors.is_empty() {
            return fmt_err!(
                NonTransient,
                "Error canceling system tasks: {}",
                errors.join(",")
            );
        }
        Ok(())
    }

    /// Cancels every non-terminal task of the workflow, returns the errors raised while
    /// canceling the system tasks.
    pub fn cancel_non_terminal_tasks(&self, workflow: &mut WorkflowModel) -> Vec<String> {
        let mut errors = Vec::new();
        for index in 0..workflow.tasks.len() {
            if workflow.tasks[index].status.is_terminal() {
                continue;
            }

            // Cancel the ones which are not completed yet....
            let mut task = workflow.tasks[index].clone();
            task.set_status(TaskStatus::Canceled);
            if let Some(system_task) = self.system_tasks.get(&task.task_type) {
                if let Err(e) = system_task.cancel(workflow, &mut task, self) {
                    error!(
                        "Error canceling system task:{}/{} in workflow: {}, error: {}",
                        task.task_type, task.task_id, workflow.workflow_id, e
                    );
                    errors.push(e.display_text().to_owned());
                }
            }
            if let Err(e) = self.persist_task(&mut task) {
                error!("Error updating task: {}, error: {}", task.task_id, e);
                errors.push(e.display_text().to_owned());
            }
            let queue_name = QueueUtils::get_queue_name_by_task_model(&task);
            if let Err(e) = self.queue_dao.remove(&queue_name, &task.task_id) {
                warn!(
                    "Error removing task {} from queue {}: {}",
                    task.task_id, queue_name, e
                );
            }
            workflow.tasks[index] = task;
        }

        if errors.is_empty() {
            self.notify_workflow_status_listener(workflow, |listener, workflow| {
                listener.on_workflow_finalized(workflow)
            });
        }
        errors
    }

    /// Mirrors the status of a finished sub workflow on the SUB_WORKFLOW task of its parent, and
    /// expedites the evaluation of the parent.
    pub fn update_parent_workflow_task(&self, sub_workflow: &WorkflowModel) -> RegorResult<()> {
        match self
            .execution_dao_facade
            .get_task_model(&sub_workflow.parent_workflow_task_id)?
        {
            Some(mut parent_task) => {
                if !parent_task.status.is_terminal() {
                    if parent_task.sub_workflow_id.is_empty() {
                        parent_task.sub_workflow_id = sub_workflow.workflow_id.clone();
                    }
                    if SubWorkflow::update_task_status(sub_workflow, &mut parent_task) {
                        self.execution_dao_facade.update_task(&mut parent_task)?;
                    }
                }
            }
            None => warn!(
                "Parent task {} of sub workflow {} not found",
                sub_workflow.parent_workflow_task_id, sub_workflow.workflow_id
            ),
        }
        self.expedite_lazy_workflow_evaluation(&sub_workflow.parent_workflow_id, EXPEDITED_PRIORITY)
    }

    /// Pushes the workflow to the front of the decider queue.
    fn expedite_lazy_workflow_evaluation(&self, workflow_id: &str, priority: i32) -> RegorResult<()> {
        if self.queue_dao.contains_message(DECIDER_QUEUE, workflow_id)? {
            self.queue_dao
                .postpone(DECIDER_QUEUE, workflow_id, priority, 0)?;
        } else {
            self.queue_dao.push(DECIDER_QUEUE, workflow_id, priority, 0)?;
        }
        debug!("Workflow {} expedited on the decider queue", workflow_id);
        Ok(())
    }

    fn notify_workflow_status_listener<F>(&self, workflow: &WorkflowModel, notify: F)
    where
        F: FnOnce(&dyn WorkflowStatusListener, &WorkflowModel),
    {
        if !workflow.workflow_definition.workflow_status_listener_enabled {
            return;
        }
        if let Some(listener) = &self.workflow_status_listener {
            notify(listener.as_ref(), workflow);
        }
    }

    fn truncate_reason(reason: &str) -> InlineStr {
        if reason.chars().count() > MAX_REASON_LENGTH {
            reason.chars().take(MAX_REASON_LENGTH).collect::<String>().into()
        } else {
            reason.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WorkflowExecutor;

    #[test]
    fn reason_is_capped() {
        let reason = "x".repeat(800);
        assert_eq!(WorkflowExecutor::truncate_reason(&reason).len(), 500);
        assert_eq!(WorkflowExecutor::truncate_reason("short"), "short");
    }

    #[test]
    fn active_domain() {
        assert_eq!(WorkflowExecutor::get_active_domain("mydomain, other"), "mydomain");
        assert_eq!(WorkflowExecutor::get_active_domain("NO_DOMAIN,mydomain"), "");
        assert_eq!(WorkflowExecutor::get_active_domain(""), "");
    }
}
