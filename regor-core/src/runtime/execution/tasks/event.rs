use regor_common::prelude::*;
use regor_common::TaskType;

use super::WorkflowSystemTask;
use crate::external::{EventQueues, Message};
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::WorkflowExecutor;
use crate::utils::ParametersUtils;

/// Publishes the task output as a message on the queue named by the task `sink`.
pub struct Event {
    event_queues: Option<Arc<dyn EventQueues>>,
}

impl Event {
    const EVENT_PRODUCED: &'static str = "event_produced";
    const SINK_PREFIX: &'static str = "regor";

    pub fn new(event_queues: Option<Arc<dyn EventQueues>>) -> Self {
        Self { event_queues }
    }

    fn event_queues(&self, task: &TaskModel) -> RegorResult<&Arc<dyn EventQueues>> {
        self.event_queues.as_ref().ok_or_else(|| {
            ErrorCode::SendEventFailed(format!(
                "No event queues configured, for task: {}",
                task.task_id
            ))
        })
    }

    /// `regor` publishes to `regor:{workflow}:{taskRef}`, `regor:{name}` to
    /// `regor:{workflow}:{name}`, any other sink is the queue name itself.
    fn compute_queue_name(workflow: &WorkflowModel, task: &TaskModel) -> RegorResult<InlineStr> {
        let input = object_map! {
            "sink" => task.input_data.get("sink").cloned().unwrap_or_default()
        };
        let replaced = ParametersUtils::replace_with_workflow(&input, workflow);
        let sink_value = match replaced.get("sink").and_then(|x| x.as_string().ok()) {
            Some(sink) if !sink.is_empty() => sink.clone(),
            _ => return str_err!(SendEventFailed, "No sink specified for the EVENT task"),
        };

        if !sink_value.starts_with(Self::SINK_PREFIX) {
            return Ok(sink_value);
        }
        let workflow_name = &workflow.workflow_definition.name;
        if sink_value.as_str() == Self::SINK_PREFIX {
            Ok(format!(
                "{}:{}:{}",
                sink_value, workflow_name, task.reference_task_name
            )
            .into())
        } else if let Some(queue) = sink_value.strip_prefix("regor:") {
            Ok(format!("{}:{}:{}", Self::SINK_PREFIX, workflow_name, queue).into())
        } else {
            fmt_err!(
                SendEventFailed,
                "Invalid / Unsupported sink specified: {}",
                sink_value
            )
        }
    }
}

impl WorkflowSystemTask for Event {
    fn task_type(&self) -> &str {
        TaskType::Event.as_ref()
    }

    fn start(
        &self,
        workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        let mut payload = task.input_data.clone();
        payload.insert("workflowInstanceId".into(), (&workflow.workflow_id).into());
        payload.insert(
            "workflowType".into(),
            (&workflow.workflow_definition.name).into(),
        );
        payload.insert(
            "workflowVersion".into(),
            workflow.workflow_definition.version.into(),
        );
        payload.insert("correlationId".into(), (&workflow.correlation_id).into());

        task.set_status(TaskStatus::InProgress);
        task.add_all_output(payload);

        match Self::compute_queue_name(workflow, task) {
            Ok(queue_name) => task.add_output(Self::EVENT_PRODUCED, queue_name),
            Err(e) => {
                error!(
                    "Error executing task: {}, workflow: {}, {}",
                    task.task_id, workflow.workflow_id, e
                );
                task.set_failed(TaskStatus::Failed, e.display_text());
            }
        }
        Ok(())
    }

    fn execute(
        &self,
        workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        let queue_name = match task
            .output_data
            .get(Self::EVENT_PRODUCED)
            .and_then(|x| x.as_string().ok())
        {
            Some(queue_name) => queue_name.clone(),
            None => return Ok(false),
        };

        let message = Message {
            id: task.task_id.clone(),
            payload: Object::convert_hashmap_to_json(&task.output_data),
            receipt: task.task_id.clone(),
        };
        let published = self
            .event_queues(task)
            .and_then(|queues| queues.publish(&queue_name, vec![message]));
        match published {
            Ok(()) => {
                debug!(
                    "Published message: {} to queue: {}",
                    task.task_id, queue_name
                );
                if !self.is_async_complete(task) {
                    task.set_status(TaskStatus::Completed);
                    return Ok(true);
                }
            }
            Err(e) => {
                error!(
                    "Error executing task: {}, workflow: {}, {}",
                    task.task_id, workflow.workflow_id, e
                );
                task.set_failed(TaskStatus::Failed, e.display_text());
            }
        }
        Ok(false)
    }

    fn cancel(
        &self,
        workflow: &WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        let queue_name = Self::compute_queue_name(workflow, task)?;
        self.event_queues(task)?
            .ack(&queue_name, &[task.task_id.clone()])
    }

    fn is_async(&self) -> bool {
        true
    }
}
