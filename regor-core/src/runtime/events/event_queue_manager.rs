use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use futures::executor::{ThreadPool, ThreadPoolBuilder};
use regor_common::prelude::*;

use super::EventProcessor;
use crate::config::Properties;
use crate::dao::EventHandlerDao;
use crate::external::{EventQueues, Message};
use crate::metrics::Monitors;

/// Listens to the event queues named by the active event handlers and hands their messages to
/// the `EventProcessor`.
///
/// The set of queues follows the handlers: it is refreshed before every poll round, so a new
/// handler starts being served and a removed one stops without a restart.
pub struct EventQueueManager {
    event_handler_dao: Arc<dyn EventHandlerDao>,
    event_queues: Arc<dyn EventQueues>,
    event_processor: Arc<EventProcessor>,
    listening_queues: Mutex<BTreeSet<InlineStr>>,
    pool: ThreadPool,
    properties: Arc<Properties>,
    shutdown: Mutex<Option<(Sender<()>, Receiver<()>)>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl EventQueueManager {
    pub fn new(
        event_handler_dao: Arc<dyn EventHandlerDao>,
        event_queues: Arc<dyn EventQueues>,
        event_processor: Arc<EventProcessor>,
        properties: Arc<Properties>,
    ) -> RegorResult<Self> {
        let thread_count = properties.event_processor_thread_count;
        if thread_count == 0 {
            return str_err!(
                IllegalArgument,
                "Cannot set event processor thread count to 0"
            );
        }
        let pool = ThreadPoolBuilder::new()
            .pool_size(thread_count)
            .name_prefix("event-action-executor-")
            .create()
            .map_err(|e| {
                ErrorCode::NonTransient(format!("event processor pool create failed: {}", e))
            })?;
        Ok(Self {
            event_handler_dao,
            event_queues,
            event_processor,
            listening_queues: Mutex::new(BTreeSet::new()),
            pool,
            properties,
            shutdown: Mutex::new(Some(crossbeam_channel::bounded(0))),
            poller: Mutex::new(None),
        })
    }

    /// Aligns the listened queues with the events of the active handlers.
    pub fn refresh_event_queues(&self) -> RegorResult<()> {
        let events = self
            .event_handler_dao
            .get_all_event_handlers()?
            .into_iter()
            .filter(|x| x.active)
            .map(|x| x.event)
            .collect::<BTreeSet<_>>();

        let mut listening = self.listening_queues.lock();
        for event in events.difference(&listening) {
            info!("Listening to event queue: {}", event);
        }
        for event in listening.difference(&events) {
            info!("Stopped listening to event queue: {}", event);
        }
        *listening = events;
        Ok(())
    }

    pub fn get_queues(&self) -> Vec<InlineStr> {
        self.listening_queues.lock().iter().cloned().collect()
    }

    pub fn get_queue_sizes(&self) -> HashMap<InlineStr, usize> {
        let mut sizes = HashMap::new();
        for queue_name in self.get_queues() {
            match self.event_queues.size(&queue_name) {
                Ok(size) => {
                    Monitors::record_event_queue_depth(&queue_name, size);
                    sizes.insert(queue_name, size);
                }
                Err(e) => error!("Error reading the size of queue: {}, {}", queue_name, e),
            }
        }
        sizes
    }

    fn poll_messages(&self) -> Vec<(InlineStr, Message)> {
        if let Err(e) = self.refresh_event_queues() {
            error!("Error refreshing the event queues: {}", e);
        }
        let mut polled = Vec::new();
        for queue_name in self.get_queues() {
            match self
                .event_queues
                .poll(&queue_name, self.properties.event_queue_poll_count.max(1))
            {
                Ok(messages) => {
                    if !messages.is_empty() {
                        Monitors::record_event_queue_messages_processed(&queue_name, messages.len());
                    }
                    polled.extend(messages.into_iter().map(|x| (queue_name.clone(), x)));
                }
                Err(e) => error!("Error polling event queue: {}, {}", queue_name, e),
            }
        }
        polled
    }

    /// Polls every listened queue once and handles the messages on the calling thread.
    /// Returns the number of messages handled.
    pub fn poll_once(&self) -> usize {
        let polled = self.poll_messages();
        let count = polled.len();
        for (queue_name, message) in polled {
            self.event_processor
                .handle(self.event_queues.as_ref(), &queue_name, message);
        }
        count
    }

    fn poll_and_dispatch(&self) {
        for (queue_name, message) in self.poll_messages() {
            let processor = Arc::clone(&self.event_processor);
            let queues = Arc::clone(&self.event_queues);
            self.pool.spawn_ok(async move {
                processor.handle(queues.as_ref(), &queue_name, message);
            });
        }
    }

    pub fn start(self: &Arc<Self>) {
        let shutdown = match self.shutdown.lock().as_ref() {
            Some((_, receiver)) => receiver.clone(),
            None => return,
        };
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return;
        }

        let manager = Arc::clone(self);
        let interval = Duration::from_millis(self.properties.event_queue_poll_interval_ms);
        *poller = Some(thread::spawn(move || loop {
            manager.poll_and_dispatch();
            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        }));
        info!(
            "Event queue manager started with {} threads",
            self.properties.event_processor_thread_count
        );
    }

    pub fn shutdown(&self) {
        self.shutdown.lock().take();
        if let Some(poller) = self.poller.lock().take() {
            if poller.join().is_err() {
                error!("The event queue poller panicked");
            }
        }
        info!("Event queue manager stopped");
    }
}
