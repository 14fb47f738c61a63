use regor_common::prelude::*;
use regor_common::{Action, EventHandler};

use super::{ActionProcessor, SimpleActionProcessor};
use crate::dao::EventHandlerDao;
use crate::external::{EventQueues, Message};
use crate::metrics::Monitors;
use crate::model::{EventExecution, EventExecutionStatus};
use crate::runtime::dal::ExecutionDaoFacade;
use crate::runtime::execution::{EvaluatorRegistry, JavascriptEvaluator};

/// Attempts of an action failing with a transient error before the message is given back.
const ACTION_ATTEMPTS: usize = 3;

/// Evaluates the messages of an event queue against the active handlers of the event and runs
/// their actions, recording one `EventExecution` per action.
///
/// A message is acked once every action ran. It is published again when an action failed with a
/// transient error, and nacked when the handlers could not be processed at all.
pub struct EventProcessor {
    event_handler_dao: Arc<dyn EventHandlerDao>,
    execution_dao_facade: Arc<ExecutionDaoFacade>,
    action_processor: Arc<dyn ActionProcessor>,
    evaluators: Arc<EvaluatorRegistry>,
}

impl EventProcessor {
    pub fn new(
        event_handler_dao: Arc<dyn EventHandlerDao>,
        execution_dao_facade: Arc<ExecutionDaoFacade>,
        action_processor: Arc<dyn ActionProcessor>,
        evaluators: Arc<EvaluatorRegistry>,
    ) -> Self {
        info!("Event Processing is ENABLED");
        Self {
            event_handler_dao,
            execution_dao_facade,
            action_processor,
            evaluators,
        }
    }

    pub fn handle(&self, queues: &dyn EventQueues, queue_name: &str, message: Message) {
        debug!(
            "Evaluating message: {} for event: {}",
            message.id, queue_name
        );
        let ids = [message.id.clone()];
        let settled = match self.execute_event(queue_name, &message) {
            Ok(transient_failures) if transient_failures.is_empty() => {
                queues.ack(queue_name, &ids).map(|_| "acked")
            }
            Ok(_) => queues.publish(queue_name, vec![message]).map(|_| "published"),
            Err(e) => {
                error!(
                    "Error handling message: {} on queue: {}, {}",
                    ids[0], queue_name, e
                );
                Monitors::record_event_queue_messages_error(queue_name);
                queues.nack(queue_name, &ids).map(|_| "nacked")
            }
        };
        match settled {
            Ok(outcome) => debug!("Message: {} {} on queue: {}", ids[0], outcome, queue_name),
            Err(e) => error!("Error settling message: {} on queue: {}, {}", ids[0], queue_name, e),
        }
        Monitors::record_event_queue_messages_handled(queue_name);
    }

    /// Runs the handlers of the event, returns the executions that failed transiently. Those are
    /// dropped from the store so a redelivery runs them again.
    pub fn execute_event(
        &self,
        event: &str,
        message: &Message,
    ) -> RegorResult<Vec<EventExecution>> {
        let handlers = self
            .event_handler_dao
            .get_event_handlers_for_event(event, true)?;

        let mut transient_failures = Vec::new();
        for handler in &handlers {
            if !self.condition_holds(handler, &message.payload) {
                let mut skipped = EventExecution::new(format!("{}_0", message.id), &message.id);
                skipped.event = handler.event.clone();
                skipped.name = handler.name.clone();
                skipped.status = EventExecutionStatus::Skipped;
                skipped.output.insert("msg".into(), Object::from_json(&message.payload));
                skipped.output.insert("condition".into(), (&handler.condition).into());
                self.execution_dao_facade.add_event_execution(&mut skipped)?;
                debug!(
                    "Condition: {} not successful for event: {} with message: {}",
                    handler.condition, handler.event, message.id
                );
                continue;
            }

            for (i, action) in handler.actions.iter().enumerate() {
                let mut execution =
                    EventExecution::new(format!("{}_{}", message.id, i), &message.id);
                execution.event = handler.event.clone();
                execution.name = handler.name.clone();
                execution.action = Some(action.action);
                execution.status = EventExecutionStatus::InProgress;
                if !self.execution_dao_facade.add_event_execution(&mut execution)? {
                    warn!("Duplicate delivery/execution of message: {}", message.id);
                    continue;
                }

                self.execute(&mut execution, action, &message.payload);
                if execution.status == EventExecutionStatus::InProgress {
                    transient_failures.push(execution);
                } else {
                    self.execution_dao_facade.update_event_execution(&execution)?;
                }
            }
        }

        for execution in &transient_failures {
            self.execution_dao_facade.remove_event_execution(execution)?;
        }
        Ok(transient_failures)
    }

    /// A condition that cannot be evaluated does not hold.
    fn condition_holds(&self, handler: &EventHandler, payload: &serde_json::Value) -> bool {
        if handler.condition.is_empty() {
            return true;
        }
        let evaluator_type = if handler.evaluator_type.is_empty() {
            JavascriptEvaluator::NAME
        } else {
            handler.evaluator_type.as_str()
        };
        let evaluator = match self.evaluators.get_evaluator(evaluator_type) {
            Some(evaluator) => evaluator,
            None => {
                warn!(
                    "Evaluator {} of event handler {} not found",
                    evaluator_type, handler.name
                );
                return false;
            }
        };

        let input = Object::from_json(&SimpleActionProcessor::expand(payload.clone()));
        match evaluator.evaluate(&handler.condition, &input) {
            Ok(result) => Self::to_boolean(&result),
            Err(e) => {
                warn!(
                    "Condition: {} of event handler {} failed: {}",
                    handler.condition, handler.name, e
                );
                false
            }
        }
    }

    fn to_boolean(value: &Object) -> bool {
        match value {
            Object::Boolean(x) => *x,
            Object::Int(x) => *x > 0,
            Object::Long(x) => *x > 0,
            Object::Double(x) => *x > 0.0,
            _ => false,
        }
    }

    fn execute(&self, execution: &mut EventExecution, action: &Action, payload: &serde_json::Value) {
        let mut attempt = 0;
        let result = loop {
            attempt += 1;
            match self
                .action_processor
                .execute(action, payload, &execution.event, &execution.message_id)
            {
                Err(e) if e.is_transient() && attempt < ACTION_ATTEMPTS => {
                    debug!("Retrying action {} of {}: {}", action.action.as_ref(), execution.id, e);
                }
                other => break other,
            }
        };

        match result {
            Ok(output) => {
                execution.output.extend(output);
                execution.status = EventExecutionStatus::Completed;
                Monitors::record_event_execution_success(
                    &execution.event,
                    &execution.name,
                    action.action.as_ref(),
                );
            }
            Err(e) => {
                error!(
                    "Error executing action: {} for event: {} with messageId: {}, {}",
                    action.action.as_ref(),
                    execution.event,
                    execution.message_id,
                    e
                );
                if !e.is_transient() {
                    execution.status = EventExecutionStatus::Failed;
                    execution.output.insert("exception".into(), e.message().into());
                    Monitors::record_event_execution_error(
                        &execution.event,
                        &execution.name,
                        action.action.as_ref(),
                        e.display_text(),
                    );
                }
            }
        }
    }
}
