use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use futures::executor::{ThreadPool, ThreadPoolBuilder};
use rand::Rng;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::WorkflowRepairService;
use crate::config::Properties;
use crate::dao::{QueueDao, DECIDER_QUEUE};
use crate::metrics::Monitors;
use crate::model::{TaskStatus, WorkflowModel};
use crate::runtime::execution::WorkflowExecutor;

/// Decides the workflows polled from the decider queue, so that every running workflow is
/// evaluated again even when no task completion triggers it.
pub struct WorkflowSweeper {
    executor: Arc<WorkflowExecutor>,
    repair_service: Option<Arc<WorkflowRepairService>>,
    queue_dao: Arc<dyn QueueDao>,
    properties: Arc<Properties>,
    pool: ThreadPool,
    shutdown: Mutex<Option<(Sender<()>, Receiver<()>)>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl WorkflowSweeper {
    pub fn new(
        executor: Arc<WorkflowExecutor>,
        repair_service: Option<Arc<WorkflowRepairService>>,
        queue_dao: Arc<dyn QueueDao>,
        properties: Arc<Properties>,
    ) -> RegorResult<Self> {
        let thread_count = properties.sweeper_thread_count.max(1);
        let pool = ThreadPoolBuilder::new()
            .pool_size(thread_count)
            .name_prefix("sweeper-")
            .create()
            .map_err(|e| ErrorCode::NonTransient(format!("sweeper pool create failed: {}", e)))?;
        Ok(Self {
            executor,
            repair_service,
            queue_dao,
            properties,
            pool,
            shutdown: Mutex::new(Some(crossbeam_channel::bounded(0))),
            poller: Mutex::new(None),
        })
    }

    /// Starts polling the decider queue, unless sweeping is disabled.
    pub fn start(self: &Arc<Self>) {
        if self.properties.sweep_disabled {
            warn!("Workflow sweep is disabled.");
            return;
        }
        let shutdown = match self.shutdown.lock().as_ref() {
            Some((_, receiver)) => receiver.clone(),
            None => return,
        };
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return;
        }

        let sweeper = Arc::clone(self);
        *poller = Some(thread::spawn(move || loop {
            sweeper.poll_and_sweep();
            match shutdown.try_recv() {
                Err(crossbeam_channel::TryRecvError::Empty) => continue,
                _ => break,
            }
        }));
        info!(
            "Workflow Sweeper started with {} threads",
            self.properties.sweeper_thread_count
        );
    }

    fn poll_and_sweep(self: &Arc<Self>) {
        let workflow_ids = match self.queue_dao.pop(
            DECIDER_QUEUE,
            self.properties.sweeper_thread_count.max(1),
            self.properties.sweeper_workflow_poll_timeout_ms,
        ) {
            Ok(workflow_ids) => workflow_ids,
            Err(e) => {
                error!("Error polling the decider queue: {}", e);
                let idle = self.shutdown.lock().as_ref().map(|(_, x)| x.clone());
                if let Some(idle) = idle {
                    if let Err(RecvTimeoutError::Disconnected) = idle.recv_timeout(Duration::from_millis(
                        self.properties.sweeper_workflow_poll_timeout_ms,
                    )) {
                        debug!("Sweeper stopped while waiting");
                    }
                }
                return;
            }
        };

        for workflow_id in workflow_ids {
            let sweeper = Arc::clone(self);
            self.pool.spawn_ok(async move {
                if let Err(e) = sweeper.sweep(&workflow_id) {
                    Monitors::record_workflow_sweep_error(&workflow_id);
                    error!("Error running sweep for {}, error: {}", workflow_id, e);
                }
            });
        }
    }

    /// Repairs and decides the workflow, then sets when it is seen again from the decider queue.
    pub fn sweep(&self, workflow_id: &str) -> RegorResult<()> {
        debug!("Running sweeper for workflow {}", workflow_id);

        if self.properties.workflow_repair_service_enabled {
            if let Some(repair_service) = &self.repair_service {
                // Verify and repair tasks in the workflow.
                repair_service.verify_and_repair_workflow_tasks(workflow_id)?;
            }
        }

        let workflow = match self.executor.decide(workflow_id) {
            Ok(workflow) => workflow,
            Err(e) if e.code() == ErrorCode::not_found_code() => {
                self.queue_dao.remove(DECIDER_QUEUE, workflow_id)?;
                info!(
                    "Workflow NOT found for id:{}. Removed it from decider queue",
                    workflow_id
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let offset_secs = Self::offset_with_jitter(self.properties.workflow_offset_timeout_secs);
        let unack_timeout_ms = match workflow {
            Some(workflow) if workflow.status.is_terminal() => {
                self.queue_dao.remove(DECIDER_QUEUE, workflow_id)?;
                return Ok(());
            }
            Some(workflow) => Self::compute_unack_timeout(&workflow, offset_secs),
            // locked by another decide, look again after the offset
            None => offset_secs * 1000,
        };

        debug!(
            "Setting unack timeout {} ms for workflow {}",
            unack_timeout_ms, workflow_id
        );
        Monitors::record_unack_timeout(unack_timeout_ms);
        self.queue_dao
            .set_unack_timeout(DECIDER_QUEUE, workflow_id, unack_timeout_ms)?;
        Ok(())
    }

    /// The unack timeout of the workflow in the decider queue, sized on its first pending task.
    /// `offset_secs` stands in wherever the task gives no timeout of its own.
    fn compute_unack_timeout(workflow: &WorkflowModel, offset_secs: i64) -> i64 {
        let workflow_timeout_secs = || match workflow.workflow_definition.timeout_seconds as i64 {
            0 => offset_secs,
            timeout => timeout + 1,
        };
        let pending = workflow
            .tasks
            .iter()
            .find(|x| matches!(x.status, TaskStatus::InProgress | TaskStatus::Scheduled));
        let task = match pending {
            Some(task) => task,
            None => return offset_secs * 1000,
        };

        if task.status == TaskStatus::Scheduled {
            let poll_timeout_secs = task
                .get_task_definition()
                .map(|x| x.poll_timeout_seconds as i64)
                .unwrap_or(0);
            return match poll_timeout_secs {
                0 => workflow_timeout_secs() * 1000,
                timeout => (timeout + 1) * 1000,
            };
        }

        if task.task_type == TaskType::Wait.as_ref() {
            if task.wait_timeout == 0 {
                return offset_secs * 1000;
            }
            return (task.wait_timeout - Utc::now().timestamp_millis()).max(0);
        }
        if task.task_type == TaskType::Human.as_ref() || task.response_timeout_seconds == 0 {
            return offset_secs * 1000;
        }
        (task.response_timeout_seconds + 1) * 1000
    }

    /// The offset moved by a uniform jitter in `[-offset/3, offset/3]` seconds.
    fn offset_with_jitter(offset_secs: i64) -> i64 {
        let bound = offset_secs / 3;
        if bound <= 0 {
            return offset_secs;
        }
        offset_secs + rand::thread_rng().gen_range(-bound..=bound)
    }

    pub fn shutdown(&self) {
        self.shutdown.lock().take();
        if let Some(poller) = self.poller.lock().take() {
            if poller.join().is_err() {
                error!("The sweeper poller panicked");
            }
        }
        info!("Workflow Sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use regor_common::prelude::*;
    use regor_common::{TaskDef, TaskType, WorkflowDef, WorkflowTask};

    use super::WorkflowSweeper;
    use crate::model::{TaskModel, TaskStatus, WorkflowModel};
    use crate::runtime::StartWorkflowInput;

    fn workflow_with(timeout_seconds: i32, task: TaskModel) -> WorkflowModel {
        let mut def = WorkflowDef::new("sweep", 1);
        def.timeout_seconds = timeout_seconds;
        let mut workflow =
            WorkflowModel::new("wf-1".into(), Arc::new(def), StartWorkflowInput::default());
        let mut done = TaskModel::new(TaskStatus::Completed);
        done.task_type = TaskType::Simple.as_ref().into();
        workflow.tasks.push(done);
        workflow.tasks.push(task);
        workflow
    }

    fn in_progress(task_type: TaskType, response_timeout_seconds: i64) -> TaskModel {
        let mut task = TaskModel::new(TaskStatus::InProgress);
        task.task_type = task_type.as_ref().into();
        task.response_timeout_seconds = response_timeout_seconds;
        task
    }

    #[test]
    fn jitter_is_bounded() {
        for _ in 0..100 {
            let offset = WorkflowSweeper::offset_with_jitter(30);
            assert!((20..=40).contains(&offset));
        }
        assert_eq!(WorkflowSweeper::offset_with_jitter(2), 2);
    }

    #[test]
    fn in_progress_task_waits_for_its_response_timeout() {
        let workflow = workflow_with(0, in_progress(TaskType::Simple, 60));
        assert_eq!(WorkflowSweeper::compute_unack_timeout(&workflow, 30), 61_000);
    }

    #[test]
    fn system_tasks_without_response_timeout_use_the_offset() {
        for task_type in [TaskType::Join, TaskType::DoWhile, TaskType::SubWorkflow, TaskType::Human] {
            let workflow = workflow_with(0, in_progress(task_type, 0));
            assert_eq!(WorkflowSweeper::compute_unack_timeout(&workflow, 27), 27_000);
        }
    }

    #[test]
    fn wait_task_is_seen_again_when_it_expires() {
        let mut wait = in_progress(TaskType::Wait, 0);
        let workflow = workflow_with(0, wait.clone());
        assert_eq!(WorkflowSweeper::compute_unack_timeout(&workflow, 27), 27_000);

        wait.wait_timeout = Utc::now().timestamp_millis() + 60_000;
        let workflow = workflow_with(0, wait.clone());
        let timeout = WorkflowSweeper::compute_unack_timeout(&workflow, 27);
        assert!(timeout > 50_000 && timeout <= 60_000);

        wait.wait_timeout = Utc::now().timestamp_millis() - 1_000;
        let workflow = workflow_with(0, wait);
        assert_eq!(WorkflowSweeper::compute_unack_timeout(&workflow, 27), 0);
    }

    #[test]
    fn scheduled_task_uses_poll_then_workflow_timeout() {
        let mut task_def = TaskDef::new("polled");
        task_def.poll_timeout_seconds = 10;
        let mut workflow_task = WorkflowTask::new("polled", "polled_ref", TaskType::Simple);
        workflow_task.task_definition = Some(task_def);
        let mut scheduled = TaskModel::new(TaskStatus::Scheduled);
        scheduled.task_type = TaskType::Simple.as_ref().into();
        scheduled.workflow_task = Some(workflow_task);
        let workflow = workflow_with(300, scheduled.clone());
        assert_eq!(WorkflowSweeper::compute_unack_timeout(&workflow, 27), 11_000);

        scheduled.workflow_task = None;
        let workflow = workflow_with(300, scheduled.clone());
        assert_eq!(WorkflowSweeper::compute_unack_timeout(&workflow, 27), 301_000);

        let workflow = workflow_with(0, scheduled);
        assert_eq!(WorkflowSweeper::compute_unack_timeout(&workflow, 27), 27_000);
    }
}
