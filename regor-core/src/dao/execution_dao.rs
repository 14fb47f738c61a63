use chrono::Utc;
use dashmap::DashMap;
use regor_common::prelude::*;
use regor_common::TaskDef;

use super::{ConcurrentExecutionLimitDao, RateLimitingDao};
use crate::model::{EventExecution, TaskModel, TaskStatus, WorkflowModel};

/// Data access layer for storing workflow executions.
///
/// Implementations must be strongly consistent per workflow id: a read following a write for
/// the same workflow must observe that write.
pub trait ExecutionDao: Send + Sync {
    /// Creates the tasks that are not scheduled yet. A task whose key `{ref}_{retryCount}`
    /// already exists in the workflow is skipped.
    ///
    /// Returns the tasks that were actually created.
    fn create_tasks(&self, tasks: &[TaskModel]) -> RegorResult<Vec<TaskModel>>;

    fn update_task(&self, task: &TaskModel) -> RegorResult<()>;

    /// Returns true if the task existed and was removed.
    fn remove_task(&self, task_id: &str) -> RegorResult<bool>;

    fn get_task(&self, task_id: &str) -> RegorResult<Option<TaskModel>>;

    /// All tasks of the workflow ordered by `seq`.
    fn get_tasks_for_workflow(&self, workflow_id: &str) -> RegorResult<Vec<TaskModel>>;

    fn create_workflow(&self, workflow: &WorkflowModel) -> RegorResult<()>;

    fn update_workflow(&self, workflow: &WorkflowModel) -> RegorResult<()>;

    /// Returns true if the deletion is successful.
    fn remove_workflow(&self, workflow_id: &str) -> RegorResult<bool>;

    fn get_workflow(
        &self,
        workflow_id: &str,
        include_tasks: bool,
    ) -> RegorResult<Option<WorkflowModel>>;

    /// Ids of the non terminal workflows of a workflow definition.
    fn get_running_workflow_ids(&self, workflow_name: &str) -> RegorResult<Vec<InlineStr>>;

    fn remove_from_pending_workflow(&self, workflow_type: &str, workflow_id: &str)
        -> RegorResult<()>;

    /// Returns false, leaving the store as is, if the execution was already recorded.
    fn add_event_execution(&self, event_execution: &EventExecution) -> RegorResult<bool>;

    fn update_event_execution(&self, event_execution: &EventExecution) -> RegorResult<()>;

    fn remove_event_execution(&self, event_execution: &EventExecution) -> RegorResult<()>;

    /// The executions a handler recorded for an event, oldest first.
    fn get_event_executions(
        &self,
        event_handler_name: &str,
        event: &str,
        message_id: Option<&str>,
    ) -> RegorResult<Vec<EventExecution>>;
}

/// An in memory `ExecutionDao`, also enforcing concurrency and rate limits.
#[derive(Default)]
pub struct InMemoryExecutionDao {
    tasks: DashMap<InlineStr, TaskModel>,
    /// Workflows are stored without their tasks.
    workflows: DashMap<InlineStr, WorkflowModel>,
    workflow_to_tasks: DashMap<InlineStr, Vec<InlineStr>>,
    /// workflow id -> task key -> task id
    scheduled_tasks: DashMap<InlineStr, HashMap<InlineStr, InlineStr>>,
    /// task def name -> non terminal task ids
    in_progress_tasks: DashMap<InlineStr, HashSet<InlineStr>>,
    /// task def name -> task ids with status IN_PROGRESS, kept for tasks with a concurrency limit
    tasks_in_progress_status: DashMap<InlineStr, HashSet<InlineStr>>,
    /// task def name -> ids admitted under the concurrency limit, in admission order
    task_limit_bucket: DashMap<InlineStr, Vec<InlineStr>>,
    /// workflow name -> non terminal workflow ids
    pending_workflows: DashMap<InlineStr, HashSet<InlineStr>>,
    /// task def name -> (execution time, task id) within the current window
    task_rate_limit_bucket: DashMap<InlineStr, VecDeque<(i64, InlineStr)>>,
    /// (handler name, event) -> execution id -> execution
    event_executions: DashMap<(InlineStr, InlineStr), BTreeMap<InlineStr, EventExecution>>,
}

impl InMemoryExecutionDao {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(task: &TaskModel) -> RegorResult<()> {
        if task.task_id.is_empty() {
            return str_err!(IllegalArgument, "Task id cannot be empty");
        }
        if task.workflow_instance_id.is_empty() {
            return fmt_err!(
                IllegalArgument,
                "Workflow instance id cannot be empty, task: {}",
                task.task_id
            );
        }
        if task.reference_task_name.is_empty() {
            return fmt_err!(
                IllegalArgument,
                "Task reference name cannot be empty, task: {}",
                task.task_id
            );
        }
        Ok(())
    }

    fn remove_task_mappings(&self, task: &TaskModel) {
        let task_key = task.get_task_key();
        if let Some(mut x) = self.scheduled_tasks.get_mut(&task.workflow_instance_id) {
            x.remove(&task_key);
        }
        if let Some(mut x) = self.in_progress_tasks.get_mut(&task.task_def_name) {
            x.remove(&task.task_id);
        }
        if let Some(mut x) = self.workflow_to_tasks.get_mut(&task.workflow_instance_id) {
            x.retain(|x| !x.eq(&task.task_id));
        }
        if let Some(mut x) = self.tasks_in_progress_status.get_mut(&task.task_def_name) {
            x.remove(&task.task_id);
        }
        if let Some(mut x) = self.task_limit_bucket.get_mut(&task.task_def_name) {
            x.retain(|x| !x.eq(&task.task_id));
        }
    }

    fn correlate_task_to_workflow(&self, task_id: &InlineStr, workflow_instance_id: &InlineStr) {
        let mut task_ids = self
            .workflow_to_tasks
            .entry(workflow_instance_id.clone())
            .or_default();
        if !task_ids.contains(task_id) {
            task_ids.push(task_id.clone());
        }
        debug!(
            "Task mapped in WORKFLOW_TO_TASKS with workflowId: {}, taskId: {}",
            workflow_instance_id, task_id
        );
    }

    /// Inserts a new workflow or updates an existing one. A workflow in terminal state is
    /// removed from the set of pending workflows.
    fn insert_or_update_workflow(&self, workflow: &WorkflowModel) {
        let workflow_id = workflow.workflow_id.clone();

        let mut stored = workflow.clone();
        stored.tasks.clear();
        self.workflows.insert(workflow_id.clone(), stored);

        if workflow.status.is_terminal() {
            if let Some(mut x) = self
                .pending_workflows
                .get_mut(&workflow.workflow_definition.name)
            {
                x.remove(&workflow_id);
            }
        } else {
            self.pending_workflows
                .entry(workflow.workflow_definition.name.clone())
                .or_default()
                .insert(workflow_id);
        }
    }
}

impl ExecutionDao for InMemoryExecutionDao {
    fn create_tasks(&self, tasks: &[TaskModel]) -> RegorResult<Vec<TaskModel>> {
        let mut created = Vec::with_capacity(tasks.len());
        for task in tasks {
            Self::validate(task)?;

            let task_key = task.get_task_key();
            {
                let mut scheduled = self
                    .scheduled_tasks
                    .entry(task.workflow_instance_id.clone())
                    .or_default();
                if scheduled.contains_key(&task_key) {
                    debug!(
                        "Task already scheduled, skipping the run {}, ref={}, key={}",
                        task.task_id, task.reference_task_name, task_key
                    );
                    continue;
                }
                scheduled.insert(task_key, task.task_id.clone());
            }

            let mut task = task.clone();
            if !task.status.is_terminal() && task.scheduled_time == 0 {
                task.scheduled_time = Utc::now().timestamp_millis();
            }

            self.correlate_task_to_workflow(&task.task_id, &task.workflow_instance_id);
            self.in_progress_tasks
                .entry(task.task_def_name.clone())
                .or_default()
                .insert(task.task_id.clone());
            debug!(
                "Scheduled task added to IN_PROGRESS_TASKS with inProgressTaskKey: {}, workflowId: {}, taskId: {}, taskType: {} during createTasks",
                task.task_def_name, task.workflow_instance_id, task.task_id, task.task_type
            );

            self.update_task(&task)?;
            created.push(task);
        }

        Ok(created)
    }

    fn update_task(&self, task: &TaskModel) -> RegorResult<()> {
        let task_id = task.task_id.clone();
        let limited = task
            .get_task_definition()
            .map(|x| x.concurrency_limit() > 0)
            .unwrap_or(false);

        if limited {
            if task.status == TaskStatus::InProgress {
                self.tasks_in_progress_status
                    .entry(task.task_def_name.clone())
                    .or_default()
                    .insert(task_id.clone());
            } else {
                if let Some(mut x) = self.tasks_in_progress_status.get_mut(&task.task_def_name) {
                    x.remove(&task_id);
                }
                if let Some(mut x) = self.task_limit_bucket.get_mut(&task.task_def_name) {
                    x.retain(|x| !x.eq(&task_id));
                }
            }
        }

        self.tasks.insert(task_id.clone(), task.clone());
        debug!(
            "Workflow task payload saved to TASK with workflowId: {}, taskId: {}, taskType: {} during updateTask",
            task.workflow_instance_id, task.task_id, task.task_type
        );

        if task.status.is_terminal() {
            if let Some(mut x) = self.in_progress_tasks.get_mut(&task.task_def_name) {
                x.remove(&task_id);
            }
        }

        self.correlate_task_to_workflow(&task_id, &task.workflow_instance_id);
        Ok(())
    }

    fn remove_task(&self, task_id: &str) -> RegorResult<bool> {
        if let Some((_, task)) = self.tasks.remove(task_id) {
            self.remove_task_mappings(&task);
            Ok(true)
        } else {
            warn!("No such task found by id {}", task_id);
            Ok(false)
        }
    }

    fn get_task(&self, task_id: &str) -> RegorResult<Option<TaskModel>> {
        Ok(self.tasks.get(task_id).map(|x| x.clone()))
    }

    fn get_tasks_for_workflow(&self, workflow_id: &str) -> RegorResult<Vec<TaskModel>> {
        let task_ids = self
            .workflow_to_tasks
            .get(workflow_id)
            .map(|x| x.value().clone())
            .unwrap_or_default();
        let mut tasks = task_ids
            .iter()
            .filter_map(|task_id| self.tasks.get(task_id).map(|x| x.clone()))
            .collect::<Vec<_>>();
        tasks.sort_by_key(|x| x.seq);
        Ok(tasks)
    }

    fn create_workflow(&self, workflow: &WorkflowModel) -> RegorResult<()> {
        if self.workflows.contains_key(&workflow.workflow_id) {
            return fmt_err!(
                Conflict,
                "Workflow with id {} already exists",
                workflow.workflow_id
            );
        }
        self.insert_or_update_workflow(workflow);
        Ok(())
    }

    fn update_workflow(&self, workflow: &WorkflowModel) -> RegorResult<()> {
        self.insert_or_update_workflow(workflow);
        Ok(())
    }

    fn remove_workflow(&self, workflow_id: &str) -> RegorResult<bool> {
        if let Some((_, workflow)) = self.workflows.remove(workflow_id) {
            if let Some(mut x) = self
                .pending_workflows
                .get_mut(&workflow.workflow_definition.name)
            {
                x.remove(workflow_id);
            }
            for task in self.get_tasks_for_workflow(workflow_id)? {
                self.remove_task(&task.task_id)?;
            }
            self.workflow_to_tasks.remove(workflow_id);
            self.scheduled_tasks.remove(workflow_id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn get_workflow(
        &self,
        workflow_id: &str,
        include_tasks: bool,
    ) -> RegorResult<Option<WorkflowModel>> {
        let workflow = match self.workflows.get(workflow_id) {
            Some(workflow) => workflow.clone(),
            None => return Ok(None),
        };
        let mut workflow = workflow;
        if include_tasks {
            workflow.tasks = self.get_tasks_for_workflow(workflow_id)?;
        }
        Ok(Some(workflow))
    }

    fn get_running_workflow_ids(&self, workflow_name: &str) -> RegorResult<Vec<InlineStr>> {
        Ok(self
            .pending_workflows
            .get(workflow_name)
            .map(|x| x.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn remove_from_pending_workflow(
        &self,
        workflow_type: &str,
        workflow_id: &str,
    ) -> RegorResult<()> {
        self.scheduled_tasks.remove(workflow_id);
        if let Some(mut x) = self.pending_workflows.get_mut(workflow_type) {
            x.remove(workflow_id);
        }
        Ok(())
    }

    fn add_event_execution(&self, event_execution: &EventExecution) -> RegorResult<bool> {
        let mut executions = self
            .event_executions
            .entry((event_execution.name.clone(), event_execution.event.clone()))
            .or_default();
        if executions.contains_key(&event_execution.id) {
            return Ok(false);
        }
        executions.insert(event_execution.id.clone(), event_execution.clone());
        Ok(true)
    }

    fn update_event_execution(&self, event_execution: &EventExecution) -> RegorResult<()> {
        self.event_executions
            .entry((event_execution.name.clone(), event_execution.event.clone()))
            .or_default()
            .insert(event_execution.id.clone(), event_execution.clone());
        Ok(())
    }

    fn remove_event_execution(&self, event_execution: &EventExecution) -> RegorResult<()> {
        let key = (event_execution.name.clone(), event_execution.event.clone());
        if let Some(mut executions) = self.event_executions.get_mut(&key) {
            executions.remove(&event_execution.id);
        }
        Ok(())
    }

    fn get_event_executions(
        &self,
        event_handler_name: &str,
        event: &str,
        message_id: Option<&str>,
    ) -> RegorResult<Vec<EventExecution>> {
        let key = (InlineStr::from(event_handler_name), InlineStr::from(event));
        let mut executions = self
            .event_executions
            .get(&key)
            .map(|x| {
                x.values()
                    .filter(|e| message_id.map(|m| e.message_id == m).unwrap_or(true))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        executions.sort_by_key(|x| x.created);
        Ok(executions)
    }
}

impl ConcurrentExecutionLimitDao for InMemoryExecutionDao {
    fn exceeds_limit(&self, task: &TaskModel) -> bool {
        let limit = match task.get_task_definition() {
            Some(task_def) => task_def.concurrency_limit(),
            None => return false,
        };
        if limit <= 0 {
            return false;
        }

        let current = self
            .tasks_in_progress_status
            .get(&task.task_def_name)
            .map(|x| x.len())
            .unwrap_or(0);
        if current >= limit as usize {
            info!(
                "Task execution count limited. task - {}:{}, limit: {}, current: {}",
                task.task_id, task.task_def_name, limit, current
            );
            return true;
        }

        let mut bucket = self
            .task_limit_bucket
            .entry(task.task_def_name.clone())
            .or_default();
        if !bucket.contains(&task.task_id) {
            bucket.push(task.task_id.clone());
        }
        let admitted = bucket
            .iter()
            .take(limit as usize)
            .any(|x| x.eq(&task.task_id));
        if !admitted {
            info!(
                "Task execution count limited. task - {}:{}, limit: {}, current: {}",
                task.task_id, task.task_def_name, limit, current
            );
        }
        !admitted
    }
}

impl RateLimitingDao for InMemoryExecutionDao {
    fn exceeds_rate_limit_per_frequency(
        &self,
        task: &TaskModel,
        task_def: Option<&TaskDef>,
    ) -> bool {
        let (rate_limit_per_frequency, rate_limit_frequency_in_seconds) = match task_def {
            Some(task_def) => (
                task_def.rate_limit_per_frequency(),
                task_def.rate_limit_frequency_in_seconds(),
            ),
            None => (
                task.rate_limit_per_frequency,
                task.rate_limit_frequency_in_seconds,
            ),
        };
        if rate_limit_per_frequency <= 0 || rate_limit_frequency_in_seconds <= 0 {
            return false;
        }

        let current_time = Utc::now().timestamp_millis();
        let window_start = current_time - rate_limit_frequency_in_seconds as i64 * 1000;
        let mut bucket = self
            .task_rate_limit_bucket
            .entry(task.task_def_name.clone())
            .or_default();
        while bucket
            .front()
            .map(|(time, _)| *time <= window_start)
            .unwrap_or(false)
        {
            bucket.pop_front();
        }

        if bucket.len() < rate_limit_per_frequency as usize {
            bucket.push_back((current_time, task.task_id.clone()));
            false
        } else {
            info!(
                "Task: {} with task def name: {} has reached the rate limit of {} per {} seconds",
                task.task_id,
                task.task_def_name,
                rate_limit_per_frequency,
                rate_limit_frequency_in_seconds
            );
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use regor_common::{TaskDef, TaskType, WorkflowTask};

    use super::*;

    fn task(task_id: &str, reference: &str, limit: Option<i32>) -> TaskModel {
        let mut task = TaskModel::new(TaskStatus::Scheduled);
        task.task_id = task_id.into();
        task.workflow_instance_id = "wf".into();
        task.reference_task_name = reference.into();
        task.task_def_name = "limited".into();
        let mut workflow_task = WorkflowTask::new("limited", reference, TaskType::Simple);
        let mut task_def = TaskDef::new("limited");
        task_def.concurrent_exec_limit = limit;
        workflow_task.task_definition = Some(task_def);
        task.workflow_task = Some(workflow_task);
        task
    }

    #[test]
    fn create_tasks_skips_scheduled_keys() {
        let dao = InMemoryExecutionDao::new();
        let created = dao.create_tasks(&[task("t1", "a", None)]).unwrap();
        assert_eq!(created.len(), 1);
        assert!(created[0].scheduled_time > 0);

        let created = dao.create_tasks(&[task("t2", "a", None)]).unwrap();
        assert!(created.is_empty());

        let mut retried = task("t3", "a", None);
        retried.retry_count = 1;
        assert_eq!(dao.create_tasks(&[retried]).unwrap().len(), 1);
        assert_eq!(dao.get_tasks_for_workflow("wf").unwrap().len(), 2);
    }

    #[test]
    fn concurrency_limit_admits_first_tasks() {
        let dao = InMemoryExecutionDao::new();
        let mut first = task("t1", "a", Some(1));
        let second = task("t2", "b", Some(1));

        assert!(!dao.exceeds_limit(&first));
        assert!(dao.exceeds_limit(&second));

        first.status = TaskStatus::InProgress;
        dao.update_task(&first).unwrap();
        assert!(dao.exceeds_limit(&second));

        first.status = TaskStatus::Completed;
        dao.update_task(&first).unwrap();
        assert!(!dao.exceeds_limit(&second));
    }

    #[test]
    fn rate_limit_within_window() {
        let dao = InMemoryExecutionDao::new();
        let mut task_def = TaskDef::new("limited");
        task_def.rate_limit_per_frequency = Some(2);
        task_def.rate_limit_frequency_in_seconds = Some(60);

        assert!(!dao.exceeds_rate_limit_per_frequency(&task("t1", "a", None), Some(&task_def)));
        assert!(!dao.exceeds_rate_limit_per_frequency(&task("t2", "b", None), Some(&task_def)));
        assert!(dao.exceeds_rate_limit_per_frequency(&task("t3", "c", None), Some(&task_def)));
        assert!(!dao.exceeds_rate_limit_per_frequency(&task("t3", "c", None), None));
    }

    #[test]
    fn event_executions_are_recorded_once() {
        let dao = InMemoryExecutionDao::new();
        let mut execution = EventExecution::new("m1_0", "m1");
        execution.name = "handler".into();
        execution.event = "queue".into();
        assert!(dao.add_event_execution(&execution).unwrap());
        assert!(!dao.add_event_execution(&execution).unwrap());

        execution.status = crate::model::EventExecutionStatus::Completed;
        dao.update_event_execution(&execution).unwrap();
        let mut other = EventExecution::new("m2_0", "m2");
        other.name = "handler".into();
        other.event = "queue".into();
        dao.add_event_execution(&other).unwrap();

        let recorded = dao.get_event_executions("handler", "queue", Some("m1")).unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].status, crate::model::EventExecutionStatus::Completed);
        assert_eq!(dao.get_event_executions("handler", "queue", None).unwrap().len(), 2);

        dao.remove_event_execution(&execution).unwrap();
        assert!(dao.add_event_execution(&execution).unwrap());
    }
}
