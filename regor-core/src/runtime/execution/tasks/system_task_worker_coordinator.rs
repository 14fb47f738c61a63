use regor_common::prelude::*;

use super::{SystemTaskRegistry, SystemTaskWorker};

/// Starts one poller per asynchronous system task of the registry.
pub struct SystemTaskWorkerCoordinator {
    system_task_worker: Arc<SystemTaskWorker>,
    system_tasks: Arc<SystemTaskRegistry>,
}

impl SystemTaskWorkerCoordinator {
    pub fn new(
        system_task_worker: Arc<SystemTaskWorker>,
        system_tasks: Arc<SystemTaskRegistry>,
    ) -> Self {
        Self {
            system_task_worker,
            system_tasks,
        }
    }

    pub fn init_system_task_executor(&self) {
        let async_system_tasks = self.system_tasks.async_system_tasks();
        for system_task in &async_system_tasks {
            self.system_task_worker.start_polling(Arc::clone(system_task));
        }
        info!(
            "SystemTaskWorkerCoordinator initialized with {} async tasks",
            async_system_tasks.len()
        );
    }
}
