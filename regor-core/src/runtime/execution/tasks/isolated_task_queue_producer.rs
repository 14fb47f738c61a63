use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use regor_common::prelude::*;
use regor_common::TaskDef;

use super::{SystemTaskRegistry, SystemTaskWorker};
use crate::config::Properties;
use crate::dao::MetadataDao;
use crate::utils::QueueUtils;

/// Makes the system task worker poll the isolated queues of the asynchronous system tasks.
///
/// A task definition with an isolation group or an execution namespace yields one queue per
/// asynchronous system task, named `TASK_TYPE[@namespace][-isolation]`. The task definitions are
/// read again on every round, so queues of new definitions are picked up while running.
pub struct IsolatedTaskQueueProducer {
    metadata_dao: Arc<dyn MetadataDao>,
    system_tasks: Arc<SystemTaskRegistry>,
    system_task_worker: Arc<SystemTaskWorker>,
    listening_queues: Mutex<HashSet<InlineStr>>,
    properties: Arc<Properties>,
    shutdown: Mutex<Option<(Sender<()>, Receiver<()>)>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl IsolatedTaskQueueProducer {
    pub fn new(
        metadata_dao: Arc<dyn MetadataDao>,
        system_tasks: Arc<SystemTaskRegistry>,
        system_task_worker: Arc<SystemTaskWorker>,
        properties: Arc<Properties>,
    ) -> Self {
        Self {
            metadata_dao,
            system_tasks,
            system_task_worker,
            listening_queues: Mutex::new(HashSet::new()),
            properties,
            shutdown: Mutex::new(Some(crossbeam_channel::bounded(0))),
            poller: Mutex::new(None),
        }
    }

    fn isolated_task_defs(&self) -> Vec<TaskDef> {
        match self.metadata_dao.get_all_task_defs() {
            Ok(task_defs) => task_defs
                .into_iter()
                .filter(|x| !x.isolation_group_id.is_empty() || !x.execution_name_space.is_empty())
                .collect(),
            Err(e) => {
                error!("Error reading the isolation groups, retrying later: {}", e);
                Vec::new()
            }
        }
    }

    /// Starts polling every isolated queue not polled yet, returns the queues added.
    pub fn add_task_queues(&self) -> Vec<InlineStr> {
        let task_defs = self.isolated_task_defs();
        debug!("Retrieved {} isolated task definitions", task_defs.len());

        let mut added = Vec::new();
        for task_def in &task_defs {
            for system_task in self.system_tasks.async_system_tasks() {
                let queue_name = QueueUtils::get_queue_name(
                    system_task.task_type(),
                    "",
                    &task_def.isolation_group_id,
                    &task_def.execution_name_space,
                );
                if !self.listening_queues.lock().insert(queue_name.clone()) {
                    continue;
                }
                debug!("Adding task queue: {} to the system task worker", queue_name);
                self.system_task_worker
                    .start_polling_with_queue_name(system_task, queue_name.clone());
                added.push(queue_name);
            }
        }
        added
    }

    pub fn listening_queues(&self) -> Vec<InlineStr> {
        self.listening_queues.lock().iter().cloned().collect()
    }

    /// Refreshes the isolated queues at a fixed interval, does nothing unless
    /// `isolated_system_task_enabled` is set.
    pub fn start(self: &Arc<Self>) {
        if !self.properties.isolated_system_task_enabled {
            info!("Isolated System Task Worker DISABLED");
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

        info!("Listening for isolation groups");
        let producer = Arc::clone(self);
        let interval =
            Duration::from_secs(self.properties.isolated_system_task_queue_poll_interval_secs.max(1));
        *poller = Some(thread::spawn(move || loop {
            producer.add_task_queues();
            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        }));
    }

    pub fn shutdown(&self) {
        self.shutdown.lock().take();
        if let Some(poller) = self.poller.lock().take() {
            if poller.join().is_err() {
                error!("The isolated task queue producer panicked");
            }
        }
    }
}
