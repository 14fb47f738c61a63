use regor_common::prelude::*;

use crate::config::Properties;
use crate::metrics::Monitors;
use crate::runtime::Lock;

/// Guards the mutations of a workflow with the configured `Lock`. Every call is a no-op
/// succeeding right away when the execution lock is disabled.
pub struct ExecutionLockService {
    lock: Arc<dyn Lock>,
    properties: Arc<Properties>,
}

impl ExecutionLockService {
    pub fn new(lock: Arc<dyn Lock>, properties: Arc<Properties>) -> Self {
        Self { lock, properties }
    }

    /// Tries to acquire lock with reasonable time_to_try duration and lease time. Exits if a lock
    /// cannot be acquired. Considering that the workflow decide can be triggered through multiple
    /// entry points, and periodically through the sweeper service, do not block on acquiring the
    /// lock, as the order of execution of decides on a workflow doesn't matter.
    pub fn acquire_lock(&self, lock_id: &str) -> bool {
        self.acquire_lock_with_lease(
            lock_id,
            self.properties.lock_time_to_try_ms,
            self.properties.lock_lease_time_ms,
        )
    }

    pub fn acquire_lock_with_time(&self, lock_id: &str, time_to_try_ms: u64) -> bool {
        self.acquire_lock_with_lease(lock_id, time_to_try_ms, self.properties.lock_lease_time_ms)
    }

    pub fn acquire_lock_with_lease(
        &self,
        lock_id: &str,
        time_to_try_ms: u64,
        lease_time_ms: u64,
    ) -> bool {
        if !self.properties.enable_workflow_execution_lock {
            return true;
        }
        if !self
            .lock
            .acquire_lock_with_lease_time(lock_id, time_to_try_ms, lease_time_ms)
        {
            debug!(
                "Thread {:?} failed to acquire lock to lockId {}.",
                std::thread::current().id(),
                lock_id
            );
            Monitors::record_acquire_lock_unsuccessful();
            return false;
        }
        debug!(
            "Thread {:?} acquired lock to lockId {}.",
            std::thread::current().id(),
            lock_id
        );
        true
    }

    pub fn release_lock(&self, lock_id: &str) {
        if self.properties.enable_workflow_execution_lock {
            self.lock.release_lock(lock_id);
            debug!(
                "Thread {:?} released lock to lockId {}.",
                std::thread::current().id(),
                lock_id
            );
        }
    }

    pub fn delete_lock(&self, lock_id: &str) {
        if self.properties.enable_workflow_execution_lock {
            self.lock.delete_lock(lock_id);
            debug!(
                "Thread {:?} deleted lockId {}.",
                std::thread::current().id(),
                lock_id
            );
        }
    }
}
