use std::thread::ThreadId;
use std::time::{Duration, Instant};

use parking_lot::Condvar;
use regor_common::prelude::*;

use super::Lock;

struct LockEntry {
    owner: ThreadId,
    holds: u32,
    lease_deadline: Option<Instant>,
}

impl LockEntry {
    fn expired(&self, now: Instant) -> bool {
        self.lease_deadline.map(|x| x <= now).unwrap_or(false)
    }
}

/// A `Lock` for a single process deployment. Locks are reentrant for the owning thread.
#[derive(Default)]
pub struct LocalOnlyLock {
    locks: Mutex<HashMap<InlineStr, LockEntry>>,
    released: Condvar,
}

impl LocalOnlyLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self, lock_id: &str, time_to_try_ms: u64, lease_time_ms: Option<u64>) -> bool {
        let current = std::thread::current().id();
        let deadline = Instant::now() + Duration::from_millis(time_to_try_ms);
        let mut locks = self.locks.lock();

        loop {
            let now = Instant::now();
            let lease_deadline = lease_time_ms.map(|x| now + Duration::from_millis(x));
            let wake_at = match locks.get_mut(lock_id) {
                Some(entry) if entry.owner == current => {
                    entry.holds += 1;
                    entry.lease_deadline = lease_deadline;
                    return true;
                }
                Some(entry) if entry.expired(now) => {
                    debug!("Lease of lock {} expired, taken over", lock_id);
                    *entry = LockEntry {
                        owner: current,
                        holds: 1,
                        lease_deadline,
                    };
                    return true;
                }
                Some(entry) => entry
                    .lease_deadline
                    .map(|x| x.min(deadline))
                    .unwrap_or(deadline),
                None => {
                    locks.insert(
                        lock_id.into(),
                        LockEntry {
                            owner: current,
                            holds: 1,
                            lease_deadline,
                        },
                    );
                    return true;
                }
            };

            if now >= deadline {
                return false;
            }
            self.released.wait_until(&mut locks, wake_at);
        }
    }
}

impl Lock for LocalOnlyLock {
    fn acquire_lock_with_timeout(&self, lock_id: &str, time_to_try_ms: u64) -> bool {
        self.acquire(lock_id, time_to_try_ms, None)
    }

    fn acquire_lock_with_lease_time(
        &self,
        lock_id: &str,
        time_to_try_ms: u64,
        lease_time_ms: u64,
    ) -> bool {
        self.acquire(lock_id, time_to_try_ms, Some(lease_time_ms))
    }

    fn release_lock(&self, lock_id: &str) {
        let current = std::thread::current().id();
        let mut locks = self.locks.lock();
        let released = match locks.get_mut(lock_id) {
            Some(entry) if entry.owner == current => {
                entry.holds -= 1;
                entry.holds == 0
            }
            _ => false,
        };
        if released {
            locks.remove(lock_id);
            self.released.notify_all();
        }
    }

    fn delete_lock(&self, lock_id: &str) {
        if self.locks.lock().remove(lock_id).is_some() {
            self.released.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrant_for_owner_thread() {
        let lock = LocalOnlyLock::new();
        assert!(lock.acquire_lock_with_timeout("wf", 10));
        assert!(lock.acquire_lock_with_timeout("wf", 10));
        lock.release_lock("wf");
        lock.release_lock("wf");
        assert!(lock.locks.lock().is_empty());
    }

    #[test]
    fn contended_lock_times_out_then_succeeds_after_release() {
        let lock = Arc::new(LocalOnlyLock::new());
        assert!(lock.acquire_lock_with_timeout("wf", 10));

        let other = lock.clone();
        let contended = std::thread::spawn(move || other.acquire_lock_with_timeout("wf", 20))
            .join()
            .unwrap();
        assert!(!contended);

        let other = lock.clone();
        let waiter = std::thread::spawn(move || {
            let acquired = other.acquire_lock_with_timeout("wf", 2000);
            other.release_lock("wf");
            acquired
        });
        std::thread::sleep(Duration::from_millis(20));
        lock.release_lock("wf");
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn expired_lease_is_taken_over() {
        let lock = Arc::new(LocalOnlyLock::new());
        assert!(lock.acquire_lock_with_lease_time("wf", 10, 20));

        let other = lock.clone();
        let acquired =
            std::thread::spawn(move || other.acquire_lock_with_lease_time("wf", 500, 1000))
                .join()
                .unwrap();
        assert!(acquired);
    }

    #[test]
    fn delete_lock_frees_it() {
        let lock = Arc::new(LocalOnlyLock::new());
        assert!(lock.acquire_lock_with_timeout("wf", 10));
        lock.delete_lock("wf");

        let other = lock.clone();
        assert!(std::thread::spawn(move || other.acquire_lock_with_timeout("wf", 10))
            .join()
            .unwrap());
    }
}
