/// Interface implemented by a distributed lock client.
///
/// A lock is identified by the id of the workflow it guards.
pub trait Lock: Send + Sync {
    /// Acquires the lock, waiting at most `time_to_try_ms`. The lock is held until released.
    fn acquire_lock_with_timeout(&self, lock_id: &str, time_to_try_ms: u64) -> bool;

    /// Acquires the lock, waiting at most `time_to_try_ms`. The lock is released automatically
    /// after `lease_time_ms` if the holder did not release it before.
    fn acquire_lock_with_lease_time(
        &self,
        lock_id: &str,
        time_to_try_ms: u64,
        lease_time_ms: u64,
    ) -> bool;

    /// Release a previously acquired lock. A no-op when the caller does not hold it.
    fn release_lock(&self, lock_id: &str);

    /// Explicitly cleanup the lock resource, whoever holds it.
    fn delete_lock(&self, lock_id: &str);
}
