use chrono::Utc;
use linked_hash_map::LinkedHashMap;
use regor_common::prelude::*;
use regor_common::{
    RetryLogic, TaskDef, TaskTimeoutPolicy, TaskType, TaskUtils, TimeoutPolicy, WorkflowDef,
    WorkflowTask,
};

use super::evaluators::EvaluatorRegistry;
use super::mapper::{TaskMapperContext, TaskMapperRegistry};
use super::tasks::SystemTaskRegistry;
use super::terminate_workflow::{DecideError, TerminateWorkflowInfo};
use crate::config::Properties;
use crate::dao::MetadataDao;
use crate::metrics::Monitors;
use crate::model::{TaskModel, TaskStatus, WorkflowModel, WorkflowStatus};
use crate::utils::{ExternalPayloadStorageUtils, IdGenerator, ParametersUtils};

type DecideResult<T> = Result<T, DecideError>;

/// Compares the task history of a workflow with its definition and tells what comes next: the
/// tasks to schedule, the tasks whose state changed, or the terminal status of the workflow.
pub struct DeciderService {
    metadata_dao: Arc<dyn MetadataDao>,
    task_mappers: TaskMapperRegistry,
    system_tasks: Arc<SystemTaskRegistry>,
    evaluators: Arc<EvaluatorRegistry>,
    payload_utils: Arc<ExternalPayloadStorageUtils>,
    properties: Arc<Properties>,
}

impl DeciderService {
    pub fn new(
        metadata_dao: Arc<dyn MetadataDao>,
        system_tasks: Arc<SystemTaskRegistry>,
        evaluators: Arc<EvaluatorRegistry>,
        payload_utils: Arc<ExternalPayloadStorageUtils>,
        properties: Arc<Properties>,
    ) -> Self {
        Self {
            metadata_dao,
            task_mappers: TaskMapperRegistry::new(),
            system_tasks,
            evaluators,
            payload_utils,
            properties,
        }
    }

    pub fn evaluators(&self) -> &EvaluatorRegistry {
        &self.evaluators
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn get_task_def(&self, name: &str) -> RegorResult<Option<TaskDef>> {
        self.metadata_dao.get_task_def(name)
    }

    pub fn get_latest_workflow_def(&self, name: &str) -> RegorResult<Option<Arc<WorkflowDef>>> {
        self.metadata_dao.get_latest_workflow_def(name)
    }

    /// Decides what happens next to `workflow`. The tasks whose state changed during the pass
    /// are updated in place, their ids are listed in the outcome. A condition that ends the
    /// workflow is reported through `DeciderOutcome::terminate`, an error is returned only when
    /// nothing could be decided.
    pub fn decide(&self, workflow: &mut WorkflowModel) -> RegorResult<DeciderOutcome> {
        let start = Utc::now().timestamp_millis();
        let result = self.decide_workflow(workflow);
        Monitors::record_workflow_decision_time(Utc::now().timestamp_millis() - start);

        match result {
            Ok(outcome) => Ok(outcome),
            Err(DecideError::Terminate(info)) => Ok(DeciderOutcome {
                terminate: Some(info),
                ..DeciderOutcome::default()
            }),
            Err(DecideError::Error(e)) => Err(e),
        }
    }

    fn decide_workflow(&self, workflow: &mut WorkflowModel) -> DecideResult<DeciderOutcome> {
        let unprocessed_tasks = workflow
            .tasks
            .iter()
            .filter(|x| x.status != TaskStatus::Skipped && !x.executed)
            .count();

        let mut tasks_to_be_scheduled = Vec::default();
        if unprocessed_tasks == 0 {
            tasks_to_be_scheduled = self.start_workflow(workflow)?;
        }
        self.decide_with_pre_scheduled(workflow, tasks_to_be_scheduled)
    }

    fn decide_with_pre_scheduled(
        &self,
        workflow: &mut WorkflowModel,
        pre_scheduled_tasks: Vec<TaskModel>,
    ) -> DecideResult<DeciderOutcome> {
        let mut outcome = DeciderOutcome::default();

        if workflow.status.is_terminal() {
            debug!(
                "Workflow {} is already finished. Reason: {}",
                workflow.to_short_string(),
                workflow.reason_for_incompletion
            );
            return Ok(outcome);
        }

        self.check_workflow_timeout(workflow)?;

        if workflow.status == WorkflowStatus::Paused {
            debug!("Workflow {} is paused", workflow.workflow_id);
            return Ok(outcome);
        }

        let mut pending_tasks = Vec::default();
        let mut executed_task_ref_names = HashSet::new();
        for (index, task) in workflow.tasks.iter().enumerate() {
            if !task.retried && task.status != TaskStatus::Skipped && !task.executed {
                pending_tasks.push(index);
            }

            if task.executed {
                executed_task_ref_names.insert(task.reference_task_name.clone());
            }

            if is_successful_terminate_task(task) {
                outcome.terminate_task = Some(task.task_id.clone());
            }
        }

        if outcome.terminate_task.is_some() {
            debug!(
                "Workflow {} reached a successful TERMINATE task",
                workflow.workflow_id
            );
            outcome.is_complete = true;
            return Ok(outcome);
        }

        let mut tasks_to_be_scheduled = LinkedHashMap::new();
        for pre_scheduled_task in pre_scheduled_tasks {
            tasks_to_be_scheduled.insert(
                pre_scheduled_task.reference_task_name.clone(),
                pre_scheduled_task,
            );
        }

        for index in pending_tasks {
            let mut pending_task = workflow.tasks[index].clone();
            if self.system_tasks.is_system_task(&pending_task.task_type)
                && !pending_task.status.is_terminal()
            {
                tasks_to_be_scheduled
                    .entry(pending_task.reference_task_name.clone())
                    .or_insert_with(|| pending_task.clone());
                executed_task_ref_names.remove(&pending_task.reference_task_name);
            }

            let task_definition = match pending_task.get_task_definition() {
                Some(task_def) => Some(task_def.clone()),
                None => workflow
                    .workflow_definition
                    .get_task_by_ref_name(pending_task.ref_name_without_iteration())
                    .and_then(|x| x.task_definition.clone()),
            };

            if let Some(task_def) = &task_definition {
                self.check_task_timeout(task_def, &mut pending_task)?;
                self.check_task_poll_timeout(task_def, &mut pending_task)?;
                if self.is_response_timed_out(task_def, &pending_task) {
                    Self::timeout_task(task_def, &mut pending_task);
                }
            }

            if !pending_task.status.is_successful() {
                let workflow_task = match &pending_task.workflow_task {
                    Some(workflow_task) => Some(workflow_task.clone()),
                    None => workflow
                        .workflow_definition
                        .get_task_by_ref_name(pending_task.ref_name_without_iteration())
                        .cloned(),
                };

                let retry_task = self.retry(
                    task_definition.as_ref(),
                    workflow_task.as_ref(),
                    &mut pending_task,
                    workflow,
                )?;
                match retry_task {
                    Some(retry_task) => {
                        executed_task_ref_names.remove(&retry_task.reference_task_name);
                        tasks_to_be_scheduled
                            .insert(retry_task.reference_task_name.clone(), retry_task);
                        outcome.tasks_to_be_updated.push(pending_task.task_id.clone());
                    }
                    None => {
                        // no attempt left, the graph moves on past this reference
                        workflow
                            .failed_reference_task_names
                            .insert(pending_task.reference_task_name.clone());
                        workflow
                            .failed_task_names
                            .insert(pending_task.task_def_name.clone());
                        pending_task.status = TaskStatus::CompletedWithErrors;
                    }
                }
            }
            workflow.tasks[index] = pending_task.clone();

            if !pending_task.executed && !pending_task.retried && pending_task.status.is_terminal()
            {
                pending_task.executed = true;
                workflow.tasks[index].executed = true;

                let mut next_tasks = self.get_next_task(workflow, &pending_task)?;
                if pending_task.is_loop_over_task()
                    && !TaskType::DoWhile.as_ref().eq(pending_task.task_type.as_str())
                    && !next_tasks.is_empty()
                {
                    next_tasks = Self::filter_next_loop_over_tasks(next_tasks, &pending_task, workflow);
                }
                debug!(
                    "{} of workflow {} is done, successors: {:?}",
                    pending_task.reference_task_name,
                    workflow.workflow_id,
                    next_tasks
                        .iter()
                        .map(|x| x.reference_task_name.as_str())
                        .collect::<Vec<_>>()
                );
                for next_task in next_tasks {
                    tasks_to_be_scheduled
                        .entry(next_task.reference_task_name.clone())
                        .or_insert(next_task);
                }
                if !outcome.tasks_to_be_updated.contains(&pending_task.task_id) {
                    outcome.tasks_to_be_updated.push(pending_task.task_id.clone());
                }
            }
        }

        let unscheduled_tasks = tasks_to_be_scheduled
            .into_iter()
            .map(|(_, task)| task)
            .filter(|x| !executed_task_ref_names.contains(&x.reference_task_name))
            .collect::<Vec<_>>();
        if !unscheduled_tasks.is_empty() {
            debug!(
                "Workflow {} gets {} new tasks: {:?}",
                workflow.workflow_id,
                unscheduled_tasks.len(),
                unscheduled_tasks
                    .iter()
                    .map(|x| x.reference_task_name.as_str())
                    .collect::<Vec<_>>()
            );
            outcome.tasks_to_be_scheduled = unscheduled_tasks;
        }

        if outcome.tasks_to_be_scheduled.is_empty() && self.check_for_workflow_completion(workflow)? {
            debug!("Marking workflow: {} as complete.", workflow.to_short_string());
            outcome.is_complete = true;
        }

        Ok(outcome)
    }

    fn filter_next_loop_over_tasks(
        mut tasks: Vec<TaskModel>,
        pending_task: &TaskModel,
        workflow: &WorkflowModel,
    ) -> Vec<TaskModel> {
        for task in tasks.iter_mut() {
            TaskUtils::append_iteration(&mut task.reference_task_name, pending_task.iteration);
            task.iteration = pending_task.iteration;
        }

        let tasks_in_workflow = workflow
            .tasks
            .iter()
            .filter(|x| x.status == TaskStatus::InProgress || x.status.is_terminal())
            .map(|x| &x.reference_task_name)
            .collect::<HashSet<_>>();

        tasks
            .into_iter()
            .filter(|x| !tasks_in_workflow.contains(&x.reference_task_name))
            .collect()
    }

    fn start_workflow(&self, workflow: &mut WorkflowModel) -> DecideResult<Vec<TaskModel>> {
        debug!("Starting workflow: {}", workflow.to_short_string());

        if workflow.re_run_from_workflow_id.is_empty() || workflow.tasks.is_empty() {
            let workflow_def = workflow.workflow_definition.clone();
            let mut task_to_schedule = match workflow_def.tasks.first() {
                Some(task) => task,
                None => {
                    return Err(TerminateWorkflowInfo::new(
                        "No tasks found to be executed",
                        WorkflowStatus::Completed,
                        None,
                    )
                    .into())
                }
            };

            while Self::is_task_skipped(task_to_schedule, workflow)? {
                match workflow_def.get_next_task(&task_to_schedule.task_reference_name) {
                    Some(next) => task_to_schedule = next,
                    None => return Ok(Vec::default()),
                }
            }

            return Ok(self.get_tasks_to_be_scheduled(workflow, task_to_schedule, 0)?);
        }

        // rerun: the first task of the copied history runs again
        match workflow.tasks.first_mut() {
            Some(rerun_from_task) => {
                rerun_from_task.status = TaskStatus::Scheduled;
                rerun_from_task.retried = true;
                rerun_from_task.retry_count = 0;
                Ok(vec![rerun_from_task.clone()])
            }
            None => Err(ErrorCode::TerminateWorkflow(format!(
                "The workflow {} is marked for re-run from {} but could not find the starting task",
                workflow.workflow_id, workflow.re_run_from_workflow_id
            ))
            .into()),
        }
    }

    /// Computes the output of `workflow`: the output of a successful TERMINATE task, else the
    /// output parameters of the definition, else the output of `task` or of the last task.
    pub fn update_workflow_output(
        &self,
        workflow: &mut WorkflowModel,
        task: Option<&TaskModel>,
    ) -> RegorResult<()> {
        if workflow.tasks.is_empty() {
            return Ok(());
        }

        let output = if let Some(terminate_task) =
            workflow.tasks.iter().find(|x| is_successful_terminate_task(x))
        {
            if !terminate_task
                .external_output_payload_storage_path
                .trim()
                .is_empty()
            {
                self.payload_utils
                    .download_payload(&terminate_task.external_output_payload_storage_path)?
            } else {
                terminate_task.output_data.clone()
            }
        } else if !workflow.workflow_definition.output_parameters.is_empty() {
            ParametersUtils::get_task_input(
                &workflow.workflow_definition.output_parameters,
                workflow,
                None,
                None,
            )?
        } else {
            let last = match task.or_else(|| workflow.tasks.last()) {
                Some(last) => last,
                None => return Ok(()),
            };
            if !last.external_output_payload_storage_path.trim().is_empty() {
                self.payload_utils
                    .download_payload(&last.external_output_payload_storage_path)?
            } else {
                last.output_data.clone()
            }
        };
        workflow.output = output;
        Ok(())
    }

    fn check_for_workflow_completion(&self, workflow: &WorkflowModel) -> DecideResult<bool> {
        for task in &workflow.tasks {
            if !task.status.is_terminal() {
                return Ok(false);
            }
            if is_successful_terminate_task(task) {
                return Ok(true);
            }
        }
        if workflow.tasks.is_empty() {
            return Ok(false);
        }

        // the latest attempt of each reference decides
        let latest_status = workflow
            .tasks
            .iter()
            .map(|x| (x.reference_task_name.as_str(), x.status))
            .collect::<HashMap<_, _>>();
        let definition_done = workflow.workflow_definition.tasks.iter().all(|x| {
            latest_status
                .get(x.task_reference_name.as_str())
                .map_or(false, |status| status.is_successful())
        });
        if !definition_done {
            return Ok(false);
        }

        for task in workflow.tasks.iter().filter(|x| !x.retried || !x.executed) {
            if let Some(next) = Self::get_next_tasks_to_be_scheduled(workflow, task)? {
                if !latest_status.contains_key(next.as_str()) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn get_next_task(
        &self,
        workflow: &WorkflowModel,
        task: &TaskModel,
    ) -> DecideResult<Vec<TaskModel>> {
        let workflow_def = &workflow.workflow_definition;

        // a SWITCH with children schedules its case itself
        if (TaskType::Decision.as_ref().eq(task.task_type.as_str())
            || TaskType::Switch.as_ref().eq(task.task_type.as_str()))
            && task.input_data.contains_key("hasChildren")
        {
            return Ok(Vec::default());
        }

        let task_reference_name = task.ref_name_without_iteration();
        let mut task_to_schedule = workflow_def.get_next_task(task_reference_name);
        while let Some(next) = task_to_schedule {
            if !Self::is_task_skipped(next, workflow)? {
                break;
            }
            task_to_schedule = workflow_def.get_next_task(&next.task_reference_name);
        }

        let task_to_schedule = match task_to_schedule {
            Some(task_to_schedule) => task_to_schedule,
            None => return Ok(Vec::default()),
        };
        if task_to_schedule.task_type() == TaskType::DoWhile {
            // a loop is entered once, its iterations are driven by the DO_WHILE task
            let next_task_ref_name = &task_to_schedule.task_reference_name;
            if workflow
                .tasks
                .iter()
                .any(|x| x.reference_task_name.eq(next_task_ref_name))
            {
                return Ok(Vec::default());
            }
        }
        Ok(self.get_tasks_to_be_scheduled(workflow, task_to_schedule, 0)?)
    }

    fn get_next_tasks_to_be_scheduled(
        workflow: &WorkflowModel,
        task: &TaskModel,
    ) -> DecideResult<Option<InlineStr>> {
        let def = &workflow.workflow_definition;

        let mut task_to_schedule = def.get_next_task(&task.reference_task_name);
        while let Some(next) = task_to_schedule {
            if !Self::is_task_skipped(next, workflow)? {
                break;
            }
            task_to_schedule = def.get_next_task(&next.task_reference_name);
        }
        Ok(task_to_schedule.map(|x| x.task_reference_name.clone()))
    }

    fn retry(
        &self,
        task_def: Option<&TaskDef>,
        workflow_task: Option<&WorkflowTask>,
        task: &mut TaskModel,
        workflow: &WorkflowModel,
    ) -> DecideResult<Option<TaskModel>> {
        let retry_count = task.retry_count;

        let task_def = match task_def {
            Some(task_def) => Some(task_def.clone()),
            None => self.metadata_dao.get_task_def(&task.task_def_name)?,
        };

        let expected_retry_count = match &task_def {
            Some(task_def) => workflow_task
                .and_then(|x| x.retry_count)
                .unwrap_or(task_def.retry_count),
            None => 0,
        };
        let task_def = match task_def {
            Some(task_def)
                if task.status.is_retriable()
                    && !TaskType::is_builtin(&task.task_type)
                    && expected_retry_count > retry_count =>
            {
                task_def
            }
            _ => {
                info!(
                    "Task {} of workflow {} ended {} after {} attempts, not retried",
                    task.reference_task_name,
                    workflow.workflow_id,
                    task.status.as_ref(),
                    retry_count + 1
                );
                return Ok(None);
            }
        };

        let start_delay = retry_delay_seconds(&task_def, task.retry_count);
        task.retried = true;

        // the next attempt keeps the input and the definition, everything of the run is reset
        let mut rescheduled = TaskModel {
            task_id: IdGenerator::generate(),
            retried_task_id: task.task_id.clone(),
            retry_count: retry_count + 1,
            start_delay_in_seconds: start_delay,
            callback_after_seconds: start_delay as i64,
            ..TaskModel::new(TaskStatus::Scheduled)
        };
        rescheduled.copy_definition_from(task);

        if let Some(workflow_task) = workflow_task {
            rescheduled.input_data.extend(ParametersUtils::get_task_input(
                &workflow_task.input_parameters,
                workflow,
                Some(&task_def),
                Some(&rescheduled.task_id),
            )?);
        }
        info!(
            "Retrying task {} of workflow {}, attempt {} in {}s",
            task.reference_task_name, workflow.workflow_id, rescheduled.retry_count, start_delay
        );
        Ok(Some(rescheduled))
    }

    fn check_workflow_timeout(&self, workflow: &WorkflowModel) -> DecideResult<()> {
        let workflow_def = &workflow.workflow_definition;
        if workflow.status.is_terminal() || workflow_def.timeout_seconds <= 0 {
            return Ok(());
        }

        let timeout = workflow_def.timeout_seconds as i64 * 1000;
        let elapsed_time = Utc::now().timestamp_millis() - workflow.start_time();
        if elapsed_time < timeout {
            return Ok(());
        }

        let reason = format!(
            "Workflow ran for {}s, over its timeoutSeconds of {}s ({})",
            elapsed_time / 1000,
            workflow_def.timeout_seconds,
            workflow_def.timeout_policy.as_ref()
        );

        match workflow_def.timeout_policy {
            TimeoutPolicy::AlertOnly => {
                info!("{} {}", workflow.workflow_id, reason);
                Monitors::record_workflow_termination(
                    &workflow_def.name,
                    WorkflowStatus::TimedOut,
                    &workflow.owner_app,
                );
                Ok(())
            }
            TimeoutPolicy::TimeOutWf => {
                Monitors::record_workflow_timeout(&workflow_def.name);
                Err(TerminateWorkflowInfo::new(reason, WorkflowStatus::TimedOut, None).into())
            }
        }
    }

    fn check_task_timeout(&self, task_def: &TaskDef, task: &mut TaskModel) -> DecideResult<()> {
        let limit_secs = task_def.timeout_seconds as i64;
        if limit_secs <= 0 || task.start_time <= 0 || task.status.is_terminal() {
            return Ok(());
        }
        let ran_ms = millis_since_delayed(task.start_time, task.start_delay_in_seconds);
        if ran_ms < limit_secs * 1000 {
            return Ok(());
        }
        let reason = format!(
            "Task ran for {}s, over its timeoutSeconds of {}s ({})",
            ran_ms / 1000,
            limit_secs,
            task_def.timeout_policy.as_ref()
        );
        Self::apply_timeout_policy(reason, task_def, task)
    }

    fn check_task_poll_timeout(&self, task_def: &TaskDef, task: &mut TaskModel) -> DecideResult<()> {
        let limit_secs = task_def.poll_timeout_seconds as i64;
        if limit_secs <= 0 || task.status != TaskStatus::Scheduled {
            return Ok(());
        }
        // a postponed task is not expected to be polled before its callback
        let waited_ms = millis_since_delayed(task.scheduled_time, task.start_delay_in_seconds)
            - task.callback_after_seconds * 1000;
        if waited_ms < limit_secs * 1000 {
            return Ok(());
        }
        let reason = format!(
            "Task waited {}s for a worker, over its pollTimeoutSeconds of {}s ({})",
            waited_ms / 1000,
            limit_secs,
            task_def.timeout_policy.as_ref()
        );
        Self::apply_timeout_policy(reason, task_def, task)
    }

    fn apply_timeout_policy(reason: String, task_def: &TaskDef, task: &mut TaskModel) -> DecideResult<()> {
        Monitors::record_task_timeout(&task.task_def_name);
        if task_def.timeout_policy == TaskTimeoutPolicy::AlertOnly {
            info!("{}", reason);
            return Ok(());
        }
        task.set_failed(TaskStatus::TimedOut, reason.as_str());
        if task_def.timeout_policy == TaskTimeoutPolicy::TimeOutWf {
            return Err(
                TerminateWorkflowInfo::new(reason, WorkflowStatus::TimedOut, Some(task.clone())).into(),
            );
        }
        Ok(())
    }

    fn is_response_timed_out(&self, task_def: &TaskDef, task: &TaskModel) -> bool {
        if task.status.is_terminal() || self.is_async_complete_system_task(task) {
            return false;
        }

        let now = Utc::now().timestamp_millis();
        let callback_time = 1000 * task.callback_after_seconds;
        let reference_time = if task.update_time > 0 {
            task.update_time
        } else {
            task.scheduled_time
        };
        let pending_time = now - (reference_time + callback_time);
        Monitors::record_task_pending_time(&task.task_type, &task.workflow_type, pending_time);
        let threshold_ms = self.properties.task_pending_time_threshold_secs * 1000;
        if pending_time > threshold_ms {
            warn!(
                "{} task {} of {}/{} pending for {} ms, threshold is {} ms",
                task.task_type,
                task.task_id,
                task.workflow_type,
                task.workflow_instance_id,
                pending_time,
                threshold_ms
            );
        }

        if task.status != TaskStatus::InProgress || task_def.response_timeout_seconds == 0 {
            return false;
        }

        let response_timeout = 1000 * task_def.response_timeout_seconds as i64;
        let adjusted_response_timeout = response_timeout + callback_time;
        let no_response_time = now - task.update_time;
        if no_response_time < adjusted_response_timeout {
            debug!(
                "Task {} silent for {} ms, responseTimeoutSeconds allows {} ms",
                task.task_id, no_response_time, adjusted_response_timeout
            );
            return false;
        }

        Monitors::record_task_response_timeout(&task.task_def_name);
        true
    }

    fn timeout_task(task_def: &TaskDef, task: &mut TaskModel) {
        let reason = format!(
            "Task {} of {} sent no update within its responseTimeoutSeconds of {}s",
            task.task_id, task.task_def_name, task_def.response_timeout_seconds
        );
        debug!("{}", reason);
        task.set_failed(TaskStatus::TimedOut, reason);
    }

    pub fn get_tasks_to_be_scheduled(
        &self,
        workflow: &WorkflowModel,
        task_to_schedule: &WorkflowTask,
        retry_count: i32,
    ) -> RegorResult<Vec<TaskModel>> {
        self.get_tasks_to_be_scheduled_with_retry(workflow, task_to_schedule, retry_count, "")
    }

    pub fn get_tasks_to_be_scheduled_with_retry(
        &self,
        workflow: &WorkflowModel,
        task_to_schedule: &WorkflowTask,
        retry_count: i32,
        retried_task_id: &str,
    ) -> RegorResult<Vec<TaskModel>> {
        let input = ParametersUtils::get_task_input(
            &task_to_schedule.input_parameters,
            workflow,
            None,
            None,
        )?;

        let tasks_in_workflow = workflow
            .tasks
            .iter()
            .filter(|x| x.status == TaskStatus::InProgress || x.status.is_terminal())
            .map(|x| &x.reference_task_name)
            .collect::<HashSet<_>>();

        let task_mapper_context = TaskMapperContext::new(
            workflow,
            task_to_schedule,
            input,
            retry_count,
            retried_task_id.into(),
            IdGenerator::generate(),
            self,
        );

        // a JOIN is mapped by its fork and again by each branch, one live instance per reference
        Ok(self
            .task_mappers
            .get_task_mapper(&task_to_schedule.type_)?
            .get_mapped_tasks(task_mapper_context)?
            .into_iter()
            .filter(|x| !tasks_in_workflow.contains(&x.reference_task_name))
            .collect())
    }

    fn is_task_skipped(task_to_schedule: &WorkflowTask, workflow: &WorkflowModel) -> DecideResult<bool> {
        match workflow.get_task_by_ref_name(&task_to_schedule.task_reference_name) {
            Ok(task) => Ok(task.map(|t| t.status == TaskStatus::Skipped).unwrap_or(false)),
            Err(e) => Err(DecideError::Terminate(TerminateWorkflowInfo::new(
                e.message(),
                WorkflowStatus::Failed,
                None,
            ))),
        }
    }

    fn is_async_complete_system_task(&self, task: &TaskModel) -> bool {
        self.system_tasks
            .get(&task.task_type)
            .map(|x| x.is_async_complete(task))
            .unwrap_or(false)
    }
}

fn is_successful_terminate_task(task: &TaskModel) -> bool {
    TaskType::Terminate.as_ref().eq(task.task_type.as_str())
        && task.status.is_terminal()
        && task.status.is_successful()
}

/// Delay before the next attempt of a task that already failed `retry_count` times.
/// Milliseconds elapsed since `since_ms` pushed back by `delay_secs`.
fn millis_since_delayed(since_ms: i64, delay_secs: i32) -> i64 {
    Utc::now().timestamp_millis() - (since_ms + delay_secs as i64 * 1000)
}

fn retry_delay_seconds(task_def: &TaskDef, retry_count: i32) -> i32 {
    let delay = task_def.retry_delay_seconds;
    match task_def.retry_logic {
        RetryLogic::Fixed => delay,
        RetryLogic::LinearBackoff => delay
            .saturating_mul(task_def.backoff_scale_factor)
            .saturating_mul(retry_count.saturating_add(1)),
        RetryLogic::ExponentialBackoff => {
            let factor = 2_i32.checked_pow(retry_count.max(0) as u32).unwrap_or(i32::MAX);
            delay.saturating_mul(factor)
        }
    }
}

#[derive(Debug, Default)]
pub struct DeciderOutcome {
    pub tasks_to_be_scheduled: Vec<TaskModel>,
    /// Ids of the tasks of the workflow updated in place by the decide pass.
    pub tasks_to_be_updated: Vec<InlineStr>,
    pub is_complete: bool,
    /// Id of the successful TERMINATE task that completed the workflow.
    pub terminate_task: Option<InlineStr>,
    pub terminate: Option<TerminateWorkflowInfo>,
}

#[cfg(test)]
mod tests {
    use regor_common::{RetryLogic, TaskDef};

    use super::retry_delay_seconds;

    fn task_def(retry_logic: RetryLogic) -> TaskDef {
        let mut task_def = TaskDef::new("t");
        task_def.retry_delay_seconds = 5;
        task_def.backoff_scale_factor = 2;
        task_def.retry_logic = retry_logic;
        task_def
    }

    #[test]
    fn backoff_delays() {
        let fixed = task_def(RetryLogic::Fixed);
        assert_eq!(retry_delay_seconds(&fixed, 0), 5);
        assert_eq!(retry_delay_seconds(&fixed, 4), 5);

        let linear = task_def(RetryLogic::LinearBackoff);
        assert_eq!(retry_delay_seconds(&linear, 0), 10);
        assert_eq!(retry_delay_seconds(&linear, 2), 30);

        let exponential = task_def(RetryLogic::ExponentialBackoff);
        assert_eq!(retry_delay_seconds(&exponential, 0), 5);
        assert_eq!(retry_delay_seconds(&exponential, 3), 40);
    }

    #[test]
    fn backoff_saturates() {
        let exponential = task_def(RetryLogic::ExponentialBackoff);
        assert_eq!(retry_delay_seconds(&exponential, 40), i32::MAX);

        let mut linear = task_def(RetryLogic::LinearBackoff);
        linear.retry_delay_seconds = i32::MAX / 2;
        assert_eq!(retry_delay_seconds(&linear, 3), i32::MAX);
    }
}
