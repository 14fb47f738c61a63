use std::cmp::Reverse;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use keyed_priority_queue::KeyedPriorityQueue;
use regor_common::prelude::*;

/// The queue holding the ids of the workflows to be (re)evaluated by the sweeper.
pub const DECIDER_QUEUE: &str = "_deciderQueue";

/// DAO responsible for managing queuing for the tasks.
///
/// Delivery is at least once: a popped message stays unacknowledged until `ack` or `remove`,
/// and goes back to the queue when its unack timeout expires.
pub trait QueueDao: Send + Sync {
    /// `priority` is 0-99, 0 is highest. The message becomes visible after
    /// `offset_time_in_second`.
    fn push(
        &self,
        queue_name: &str,
        id: &str,
        priority: i32,
        offset_time_in_second: i64,
    ) -> RegorResult<()>;

    /// Returns true if the message was pushed, false if it was already in the queue.
    fn push_if_not_exists(
        &self,
        queue_name: &str,
        id: &str,
        priority: i32,
        offset_time_in_second: i64,
    ) -> RegorResult<bool> {
        if self.contains_message(queue_name, id)? {
            Ok(false)
        } else {
            self.push(queue_name, id, priority, offset_time_in_second)?;
            Ok(true)
        }
    }

    /// Pops up to `count` visible messages, waiting up to `timeout_ms` for them.
    fn pop(&self, queue_name: &str, count: usize, timeout_ms: u64) -> RegorResult<Vec<InlineStr>>;

    /// Postpone a given message so that it won't be available for further polls until the
    /// specified duration.
    fn postpone(
        &self,
        queue_name: &str,
        message_id: &str,
        priority: i32,
        postpone_duration_in_seconds: i64,
    ) -> RegorResult<bool> {
        self.remove(queue_name, message_id)?;
        self.push(
            queue_name,
            message_id,
            priority,
            postpone_duration_in_seconds,
        )?;
        Ok(true)
    }

    fn remove(&self, queue_name: &str, message_id: &str) -> RegorResult<()>;

    /// Makes a waiting message visible right away, keeping its priority.
    ///
    /// Returns false if the message is not waiting in the queue.
    fn reset_offset_time(&self, queue_name: &str, message_id: &str) -> RegorResult<bool>;

    /// Returns true if the message was found and acknowledged.
    fn ack(&self, queue_name: &str, message_id: &str) -> RegorResult<bool>;

    /// Makes an unacknowledged message visible again right away.
    fn nack(&self, queue_name: &str, message_id: &str) -> RegorResult<bool>;

    fn contains_message(&self, queue_name: &str, message_id: &str) -> RegorResult<bool>;

    /// Extend (or shorten) the lease of an unacknowledged message.
    ///
    /// Returns false if the message is not popped.
    fn set_unack_timeout(
        &self,
        queue_name: &str,
        message_id: &str,
        unack_timeout_ms: i64,
    ) -> RegorResult<bool>;

    /// Number of messages waiting in the queue, unacknowledged ones excluded.
    fn size(&self, queue_name: &str) -> RegorResult<usize>;
}

/// Ordered by visibility time, then priority, then arrival.
type Score = Reverse<(i64, i32, u64)>;

#[derive(Default)]
struct MemoryQueue {
    messages: KeyedPriorityQueue<InlineStr, Score>,
    /// message id -> (lease deadline, priority)
    unacked: HashMap<InlineStr, (i64, i32)>,
    sequence: u64,
}

impl MemoryQueue {
    fn push(&mut self, id: &str, priority: i32, deliver_at: i64) {
        self.unacked.remove(id);
        self.sequence += 1;
        self.messages
            .push(id.into(), Reverse((deliver_at, priority, self.sequence)));
    }

    /// Messages whose lease expired are visible again.
    fn process_unacks(&mut self, now: i64) {
        let expired = self
            .unacked
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(id, (_, priority))| (id.clone(), *priority))
            .collect::<Vec<_>>();
        for (id, priority) in expired {
            debug!("Message {} unack timeout expired, pushed back to queue", id);
            self.push(&id, priority, now);
        }
    }

    fn pop_visible(&mut self, now: i64, unack_timeout_ms: i64) -> Option<InlineStr> {
        let visible = self
            .messages
            .peek()
            .map(|(_, Reverse((deliver_at, _, _)))| *deliver_at <= now)
            .unwrap_or(false);
        if !visible {
            return None;
        }
        self.messages
            .pop()
            .map(|(id, Reverse((_, priority, _)))| {
                self.unacked
                    .insert(id.clone(), (now + unack_timeout_ms, priority));
                id
            })
    }
}

/// An in memory `QueueDao`, with a priority queue and an unack map per queue name.
pub struct InMemoryQueueDao {
    queues: DashMap<InlineStr, Arc<Mutex<MemoryQueue>>>,
    unack_timeout_ms: i64,
}

impl Default for InMemoryQueueDao {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueueDao {
    pub const DEFAULT_UNACK_TIMEOUT_MS: i64 = 60_000;

    pub fn new() -> Self {
        Self::with_unack_timeout(Self::DEFAULT_UNACK_TIMEOUT_MS)
    }

    pub fn with_unack_timeout(unack_timeout_ms: i64) -> Self {
        Self {
            queues: DashMap::new(),
            unack_timeout_ms,
        }
    }

    fn queue(&self, queue_name: &str) -> Arc<Mutex<MemoryQueue>> {
        if let Some(queue) = self.queues.get(queue_name) {
            return queue.clone();
        }
        self.queues
            .entry(queue_name.into())
            .or_default()
            .value()
            .clone()
    }

    fn existing_queue(&self, queue_name: &str) -> Option<Arc<Mutex<MemoryQueue>>> {
        self.queues.get(queue_name).map(|x| x.clone())
    }
}

impl QueueDao for InMemoryQueueDao {
    fn push(
        &self,
        queue_name: &str,
        id: &str,
        priority: i32,
        offset_time_in_second: i64,
    ) -> RegorResult<()> {
        let priority = if (0..=99).contains(&priority) {
            priority
        } else {
            0
        };
        let deliver_at = Utc::now().timestamp_millis() + offset_time_in_second.max(0) * 1000;
        self.queue(queue_name)
            .lock()
            .push(id, priority, deliver_at);
        Ok(())
    }

    fn pop(&self, queue_name: &str, count: usize, timeout_ms: u64) -> RegorResult<Vec<InlineStr>> {
        let queue = self.queue(queue_name);
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut message_ids = Vec::with_capacity(count);

        loop {
            {
                let mut queue = queue.lock();
                let now = Utc::now().timestamp_millis();
                queue.process_unacks(now);
                while message_ids.len() < count {
                    match queue.pop_visible(now, self.unack_timeout_ms) {
                        Some(id) => message_ids.push(id),
                        None => break,
                    }
                }
            }

            if message_ids.len() >= count {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
        }

        Ok(message_ids)
    }

    fn remove(&self, queue_name: &str, message_id: &str) -> RegorResult<()> {
        if let Some(queue) = self.existing_queue(queue_name) {
            let mut queue = queue.lock();
            queue.messages.remove(message_id);
            queue.unacked.remove(message_id);
        }
        Ok(())
    }

    fn reset_offset_time(&self, queue_name: &str, message_id: &str) -> RegorResult<bool> {
        if let Some(queue) = self.existing_queue(queue_name) {
            let mut queue = queue.lock();
            if let Some(Reverse((_, priority, _))) = queue.messages.remove(message_id) {
                queue.push(message_id, priority, Utc::now().timestamp_millis());
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn ack(&self, queue_name: &str, message_id: &str) -> RegorResult<bool> {
        Ok(self
            .existing_queue(queue_name)
            .map(|queue| queue.lock().unacked.remove(message_id).is_some())
            .unwrap_or(false))
    }

    fn nack(&self, queue_name: &str, message_id: &str) -> RegorResult<bool> {
        if let Some(queue) = self.existing_queue(queue_name) {
            let mut queue = queue.lock();
            if let Some((_, priority)) = queue.unacked.remove(message_id) {
                queue.push(message_id, priority, Utc::now().timestamp_millis());
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn contains_message(&self, queue_name: &str, message_id: &str) -> RegorResult<bool> {
        Ok(self
            .existing_queue(queue_name)
            .map(|queue| {
                let queue = queue.lock();
                queue.messages.get_priority(message_id).is_some()
                    || queue.unacked.contains_key(message_id)
            })
            .unwrap_or(false))
    }

    fn set_unack_timeout(
        &self,
        queue_name: &str,
        message_id: &str,
        unack_timeout_ms: i64,
    ) -> RegorResult<bool> {
        if let Some(queue) = self.existing_queue(queue_name) {
            let mut queue = queue.lock();
            if let Some(lease) = queue.unacked.get_mut(message_id) {
                lease.0 = Utc::now().timestamp_millis() + unack_timeout_ms;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn size(&self, queue_name: &str) -> RegorResult<usize> {
        Ok(self
            .existing_queue(queue_name)
            .map(|queue| queue.lock().messages.len())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_respects_delay_and_priority() {
        let dao = InMemoryQueueDao::new();
        dao.push("q", "low", 10, 0).unwrap();
        dao.push("q", "high", 0, 0).unwrap();
        dao.push("q", "later", 0, 60).unwrap();

        let popped = dao.pop("q", 3, 20).unwrap();
        assert_eq!(popped, vec![InlineStr::from("high"), InlineStr::from("low")]);
        assert_eq!(dao.size("q").unwrap(), 1);
        assert!(dao.contains_message("q", "high").unwrap());
    }

    #[test]
    fn unacked_message_returns_after_lease() {
        let dao = InMemoryQueueDao::with_unack_timeout(20);
        dao.push("q", "m", 0, 0).unwrap();
        assert_eq!(dao.pop("q", 1, 0).unwrap().len(), 1);
        assert!(dao.pop("q", 1, 0).unwrap().is_empty());

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(dao.pop("q", 1, 0).unwrap().len(), 1);
        assert!(dao.ack("q", "m").unwrap());
        assert!(!dao.contains_message("q", "m").unwrap());
    }

    #[test]
    fn postpone_and_set_unack_timeout() {
        let dao = InMemoryQueueDao::with_unack_timeout(20);
        dao.push("q", "m", 0, 0).unwrap();
        assert_eq!(dao.pop("q", 1, 0).unwrap().len(), 1);
        assert!(dao.set_unack_timeout("q", "m", 60_000).unwrap());
        std::thread::sleep(Duration::from_millis(30));
        assert!(dao.pop("q", 1, 0).unwrap().is_empty());

        dao.postpone("q", "m", 0, 60).unwrap();
        assert!(dao.pop("q", 1, 0).unwrap().is_empty());
        assert!(!dao.set_unack_timeout("q", "m", 0).unwrap());
        assert!(dao.contains_message("q", "m").unwrap());

        assert!(dao.push_if_not_exists("q", "n", 0, 0).unwrap());
        assert!(!dao.push_if_not_exists("q", "n", 0, 0).unwrap());
    }

    #[test]
    fn reset_offset_time_makes_message_visible() {
        let dao = InMemoryQueueDao::new();
        dao.push("q", "m", 5, 600).unwrap();
        assert!(dao.pop("q", 1, 0).unwrap().is_empty());

        assert!(dao.reset_offset_time("q", "m").unwrap());
        assert_eq!(dao.pop("q", 1, 0).unwrap(), vec![InlineStr::from("m")]);
        assert!(!dao.reset_offset_time("q", "m").unwrap());
        assert!(!dao.reset_offset_time("other", "m").unwrap());
    }
}
