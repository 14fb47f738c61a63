use dashmap::DashMap;
use regor_common::prelude::*;

/// A message published by an EVENT task.
#[derive(Clone, Debug)]
pub struct Message {
    pub id: InlineStr,
    pub payload: serde_json::Value,
    pub receipt: InlineStr,
}

impl Message {
    pub fn new(id: &str, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            payload,
            receipt: id.into(),
        }
    }
}

/// The event bus. EVENT tasks publish to it, the event queue manager polls it and hands the
/// messages to the event handlers listening to the queue.
///
/// A polled message stays in flight until it is acked, or nacked back to the queue.
pub trait EventQueues: Send + Sync {
    /// A message whose id is already waiting in the queue replaces it.
    fn publish(&self, queue_name: &str, messages: Vec<Message>) -> RegorResult<()>;

    fn poll(&self, queue_name: &str, count: usize) -> RegorResult<Vec<Message>>;

    fn ack(&self, queue_name: &str, message_ids: &[InlineStr]) -> RegorResult<()>;

    /// Makes in flight messages visible again.
    fn nack(&self, queue_name: &str, message_ids: &[InlineStr]) -> RegorResult<()>;

    /// Number of messages waiting in the queue, in flight ones excluded.
    fn size(&self, queue_name: &str) -> RegorResult<usize>;
}

#[derive(Default)]
struct EventQueue {
    pending: VecDeque<Message>,
    in_flight: HashMap<InlineStr, Message>,
}

/// Keeps every published message per queue name, until it is acked.
#[derive(Default)]
pub struct InMemoryEventQueues {
    queues: DashMap<InlineStr, EventQueue>,
}

impl InMemoryEventQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// The waiting messages followed by the in flight ones.
    pub fn messages(&self, queue_name: &str) -> Vec<Message> {
        self.queues
            .get(queue_name)
            .map(|x| {
                x.pending
                    .iter()
                    .chain(x.in_flight.values())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl EventQueues for InMemoryEventQueues {
    fn publish(&self, queue_name: &str, messages: Vec<Message>) -> RegorResult<()> {
        debug!("Publishing {} message(s) to {}", messages.len(), queue_name);
        let mut queue = self.queues.entry(queue_name.into()).or_default();
        for message in messages {
            queue.in_flight.remove(&message.id);
            match queue.pending.iter_mut().find(|x| x.id == message.id) {
                Some(existing) => *existing = message,
                None => queue.pending.push_back(message),
            }
        }
        Ok(())
    }

    fn poll(&self, queue_name: &str, count: usize) -> RegorResult<Vec<Message>> {
        let mut queue = match self.queues.get_mut(queue_name) {
            Some(queue) => queue,
            None => return Ok(Vec::new()),
        };
        let mut polled = Vec::with_capacity(count.min(queue.pending.len()));
        while polled.len() < count {
            match queue.pending.pop_front() {
                Some(message) => {
                    queue.in_flight.insert(message.id.clone(), message.clone());
                    polled.push(message);
                }
                None => break,
            }
        }
        Ok(polled)
    }

    fn ack(&self, queue_name: &str, message_ids: &[InlineStr]) -> RegorResult<()> {
        if let Some(mut queue) = self.queues.get_mut(queue_name) {
            for id in message_ids {
                queue.in_flight.remove(id);
            }
            queue.pending.retain(|x| !message_ids.contains(&x.id));
        }
        Ok(())
    }

    fn nack(&self, queue_name: &str, message_ids: &[InlineStr]) -> RegorResult<()> {
        if let Some(mut queue) = self.queues.get_mut(queue_name) {
            for id in message_ids {
                if let Some(message) = queue.in_flight.remove(id) {
                    queue.pending.push_back(message);
                }
            }
        }
        Ok(())
    }

    fn size(&self, queue_name: &str) -> RegorResult<usize> {
        Ok(self
            .queues
            .get(queue_name)
            .map(|x| x.pending.len())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn polled_messages_stay_in_flight_until_acked() {
        let queues = InMemoryEventQueues::new();
        queues
            .publish("q", vec![Message::new("m1", json!({"n": 1})), Message::new("m2", json!({}))])
            .unwrap();
        assert_eq!(queues.size("q").unwrap(), 2);

        let polled = queues.poll("q", 1).unwrap();
        assert_eq!(polled[0].id, "m1");
        assert_eq!(queues.size("q").unwrap(), 1);
        assert_eq!(queues.messages("q").len(), 2);

        queues.nack("q", &["m1".into()]).unwrap();
        assert_eq!(queues.size("q").unwrap(), 2);

        let polled = queues.poll("q", 5).unwrap();
        assert_eq!(polled.len(), 2);
        queues.ack("q", &["m1".into(), "m2".into()]).unwrap();
        assert!(queues.messages("q").is_empty());
        assert!(queues.poll("missing", 1).unwrap().is_empty());
    }

    #[test]
    fn republished_message_replaces_the_waiting_one() {
        let queues = InMemoryEventQueues::new();
        queues.publish("q", vec![Message::new("m", json!({"v": 1}))]).unwrap();
        queues.publish("q", vec![Message::new("m", json!({"v": 2}))]).unwrap();
        let messages = queues.messages("q");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload["v"], 2);
    }
}
