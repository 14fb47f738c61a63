use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use futures::executor::{ThreadPool, ThreadPoolBuilder};
use regor_common::prelude::*;

use super::WorkflowSystemTask;
use crate::config::Properties;
use crate::dao::QueueDao;
use crate::metrics::Monitors;
use crate::runtime::execution::AsyncSystemTaskExecutor;
use crate::utils::SemaphoreUtil;

/// Polls the queues of the asynchronous system tasks and hands the polled tasks to the
/// `AsyncSystemTaskExecutor` on a bounded thread pool.
pub struct SystemTaskWorker {
    async_system_task_executor: Arc<AsyncSystemTaskExecutor>,
    queue_dao: Arc<dyn QueueDao>,
    semaphore_util: Arc<SemaphoreUtil>,
    pool: ThreadPool,
    properties: Arc<Properties>,
    shutdown: Mutex<Option<(Sender<()>, Receiver<()>)>>,
    pollers: Mutex<Vec<JoinHandle<()>>>,
}

impl SystemTaskWorker {
    pub fn new(
        async_system_task_executor: Arc<AsyncSystemTaskExecutor>,
        queue_dao: Arc<dyn QueueDao>,
        properties: Arc<Properties>,
    ) -> RegorResult<Self> {
        let thread_count = properties.system_task_worker_thread_count.max(1);
        let pool = ThreadPoolBuilder::new()
            .pool_size(thread_count)
            .name_prefix("system-task-worker-")
            .create()
            .map_err(|e| {
                ErrorCode::NonTransient(format!("system task worker pool create failed: {}", e))
            })?;
        info!("SystemTaskWorker initialized with {} threads", thread_count);
        Ok(Self {
            async_system_task_executor,
            queue_dao,
            semaphore_util: Arc::new(SemaphoreUtil::new(thread_count)),
            pool,
            properties,
            shutdown: Mutex::new(Some(crossbeam_channel::bounded(0))),
            pollers: Mutex::new(Vec::new()),
        })
    }

    /// Starts a thread polling the queue named after the task type.
    pub fn start_polling(self: &Arc<Self>, system_task: Arc<dyn WorkflowSystemTask>) {
        let queue_name = InlineStr::from(system_task.task_type());
        self.start_polling_with_queue_name(system_task, queue_name);
    }

    pub fn start_polling_with_queue_name(
        self: &Arc<Self>,
        system_task: Arc<dyn WorkflowSystemTask>,
        queue_name: InlineStr,
    ) {
        let shutdown = match self.shutdown.lock().as_ref() {
            Some((_, receiver)) => receiver.clone(),
            None => {
                warn!("SystemTaskWorker is stopped, {} not polled", queue_name);
                return;
            }
        };

        info!("Adding the queue: {} to the system task worker", queue_name);
        let worker = Arc::clone(self);
        let poll_interval = Duration::from_millis(self.properties.system_task_worker_poll_interval_ms);
        let handle = thread::spawn(move || loop {
            worker.poll_and_execute(&system_task, &queue_name);
            match shutdown.recv_timeout(poll_interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => {
                    debug!("Stopped polling queue: {}", queue_name);
                    break;
                }
            }
        });
        self.pollers.lock().push(handle);
    }

    /// Polls as many messages as there are free slots and executes them on the pool.
    pub fn poll_and_execute(&self, system_task: &Arc<dyn WorkflowSystemTask>, queue_name: &str) {
        let messages_to_acquire = self
            .semaphore_util
            .available_slots()
            .min(self.properties.system_task_max_poll_count.max(1));

        if messages_to_acquire == 0 || !self.semaphore_util.acquire_slots(messages_to_acquire) {
            // no available slots, do not poll
            Monitors::record_system_task_worker_polling_limited(queue_name);
            return;
        }

        trace!(
            "Polling queue: {} with {} slots acquired",
            queue_name,
            messages_to_acquire
        );

        let polled_task_ids = match self.queue_dao.pop(
            queue_name,
            messages_to_acquire,
            self.properties.system_task_queue_pop_timeout_ms,
        ) {
            Ok(polled_task_ids) => polled_task_ids,
            Err(e) => {
                // release the permit if an error is raised during polling, because the thread
                // would not be busy
                self.semaphore_util.complete_processing(messages_to_acquire);
                Monitors::record_task_poll_error(system_task.task_type(), e.display_text());
                error!("Error polling system task in queue: {}, error: {}", queue_name, e);
                return;
            }
        };

        Monitors::record_task_poll_count(queue_name, polled_task_ids.len());
        trace!(
            "Polling queue: {}, got {} tasks",
            queue_name,
            polled_task_ids.len()
        );

        // Immediately release unused slots when number of messages acquired is less than
        // acquired slots
        if polled_task_ids.len() < messages_to_acquire {
            self.semaphore_util
                .complete_processing(messages_to_acquire - polled_task_ids.len());
        }

        for task_id in polled_task_ids {
            if task_id.is_empty() {
                self.semaphore_util.complete_processing(1);
                continue;
            }

            debug!(
                "Task: {} from queue: {} being sent to the workflow executor",
                task_id, queue_name
            );
            if let Err(e) = self.queue_dao.ack(queue_name, &task_id) {
                warn!("Error acking task: {} in queue: {}, error: {}", task_id, queue_name, e);
            }

            let executor = Arc::clone(&self.async_system_task_executor);
            let semaphore_util = Arc::clone(&self.semaphore_util);
            let system_task = Arc::clone(system_task);
            self.pool.spawn_ok(async move {
                if let Err(e) = executor.execute(system_task, &task_id) {
                    error!("Error executing system task: {}, error: {}", task_id, e);
                }
                semaphore_util.complete_processing(1);
            });
        }
    }

    /// Stops every poller and waits for them to exit. The tasks already handed to the pool run
    /// to completion.
    pub fn shutdown(&self) {
        // dropping the sender disconnects every poller
        self.shutdown.lock().take();
        let pollers = std::mem::take(&mut *self.pollers.lock());
        for poller in pollers {
            if poller.join().is_err() {
                error!("A system task poller panicked");
            }
        }
        info!("SystemTaskWorker stopped");
    }
}
