use dashmap::DashMap;
use regor_common::prelude::*;
use regor_common::EventHandler;

/// Data access layer for the event handlers.
pub trait EventHandlerDao: Send + Sync {
    /// Fails with `Conflict` if a handler with the same name exists.
    fn add_event_handler(&self, event_handler: EventHandler) -> RegorResult<()>;

    /// Fails with `NotFound` if there is no handler with that name.
    fn update_event_handler(&self, event_handler: EventHandler) -> RegorResult<()>;

    fn remove_event_handler(&self, name: &str) -> RegorResult<()>;

    fn get_all_event_handlers(&self) -> RegorResult<Vec<EventHandler>>;

    fn get_event_handlers_for_event(
        &self,
        event: &str,
        active_only: bool,
    ) -> RegorResult<Vec<EventHandler>>;
}

#[derive(Default)]
pub struct InMemoryEventHandlerDao {
    handlers: DashMap<InlineStr, EventHandler>,
}

impl InMemoryEventHandlerDao {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventHandlerDao for InMemoryEventHandlerDao {
    fn add_event_handler(&self, event_handler: EventHandler) -> RegorResult<()> {
        match self.handlers.entry(event_handler.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => fmt_err!(
                Conflict,
                "EventHandler with name {} already exists!",
                event_handler.name
            ),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(event_handler);
                Ok(())
            }
        }
    }

    fn update_event_handler(&self, event_handler: EventHandler) -> RegorResult<()> {
        match self.handlers.get_mut(&event_handler.name) {
            Some(mut existing) => {
                *existing = event_handler;
                Ok(())
            }
            None => fmt_err!(
                NotFound,
                "EventHandler with name {} not found!",
                event_handler.name
            ),
        }
    }

    fn remove_event_handler(&self, name: &str) -> RegorResult<()> {
        if self.handlers.remove(name).is_none() {
            return fmt_err!(NotFound, "EventHandler with name {} not found!", name);
        }
        Ok(())
    }

    fn get_all_event_handlers(&self) -> RegorResult<Vec<EventHandler>> {
        Ok(self.handlers.iter().map(|x| x.value().clone()).collect())
    }

    fn get_event_handlers_for_event(
        &self,
        event: &str,
        active_only: bool,
    ) -> RegorResult<Vec<EventHandler>> {
        Ok(self
            .handlers
            .iter()
            .filter(|x| x.event == event && (!active_only || x.active))
            .map(|x| x.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use regor_common::{Action, TaskDetails};

    use super::*;

    fn handler(name: &str, event: &str, active: bool) -> EventHandler {
        let mut handler = EventHandler::new(name, event);
        handler.active = active;
        handler
            .actions
            .push(Action::complete_task(TaskDetails::default()));
        handler
    }

    #[test]
    fn handlers_are_unique_by_name() {
        let dao = InMemoryEventHandlerDao::new();
        dao.add_event_handler(handler("h1", "q1", true)).unwrap();
        let err = dao.add_event_handler(handler("h1", "q2", true)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::conflict_code());

        dao.update_event_handler(handler("h1", "q2", true)).unwrap();
        assert_eq!(dao.get_all_event_handlers().unwrap()[0].event, "q2");

        let err = dao.update_event_handler(handler("h2", "q2", true)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::not_found_code());
        assert!(dao.remove_event_handler("h2").is_err());
        dao.remove_event_handler("h1").unwrap();
        assert!(dao.get_all_event_handlers().unwrap().is_empty());
    }

    #[test]
    fn handlers_for_event_filter_inactive() {
        let dao = InMemoryEventHandlerDao::new();
        dao.add_event_handler(handler("on", "q", true)).unwrap();
        dao.add_event_handler(handler("off", "q", false)).unwrap();
        dao.add_event_handler(handler("other", "p", true)).unwrap();

        assert_eq!(dao.get_event_handlers_for_event("q", false).unwrap().len(), 2);
        let active = dao.get_event_handlers_for_event("q", true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "on");
    }
}
