use std::sync::atomic::{AtomicUsize, Ordering};

/// A non blocking counting semaphore bounding the tasks a worker executes at once.
pub struct SemaphoreUtil {
    available_slots: AtomicUsize,
}

impl SemaphoreUtil {
    pub fn new(num_slots: usize) -> Self {
        Self {
            available_slots: AtomicUsize::new(num_slots),
        }
    }

    /// Signals that processing is complete and the specified number of slots are available again.
    pub fn complete_processing(&self, num_slots: usize) {
        self.available_slots.fetch_add(num_slots, Ordering::SeqCst);
    }

    pub fn available_slots(&self) -> usize {
        self.available_slots.load(Ordering::SeqCst)
    }

    /// Returns false without blocking if fewer than `num_slots` are available.
    pub fn acquire_slots(&self, num_slots: usize) -> bool {
        let mut current = self.available_slots.load(Ordering::SeqCst);
        loop {
            if current < num_slots {
                return false;
            }
            match self.available_slots.compare_exchange(
                current,
                current - num_slots,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SemaphoreUtil;

    #[test]
    fn acquire_and_release() {
        let semaphore = SemaphoreUtil::new(2);
        assert!(semaphore.acquire_slots(2));
        assert!(!semaphore.acquire_slots(1));
        semaphore.complete_processing(1);
        assert_eq!(semaphore.available_slots(), 1);
        assert!(semaphore.acquire_slots(1));
    }
}
