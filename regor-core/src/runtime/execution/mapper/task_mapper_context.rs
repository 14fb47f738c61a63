use std::fmt;

use chrono::Utc;
use regor_common::prelude::*;
use regor_common::{TaskDef, WorkflowTask};

use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::DeciderService;

/// Business object used for interaction between the DeciderService and Different Mappers
pub struct TaskMapperContext<'a> {
    pub workflow_model: &'a WorkflowModel,
    pub workflow_task: &'a WorkflowTask,
    pub task_input: HashMap<InlineStr, Object>,
    pub retry_count: i32,
    pub retry_task_id: InlineStr,
    pub task_id: InlineStr,
    /// Mappers of control flow tasks call back into the decider to map their children.
    pub decider: &'a DeciderService,
}

impl<'a> TaskMapperContext<'a> {
    pub fn new(
        workflow_model: &'a WorkflowModel,
        workflow_task: &'a WorkflowTask,
        task_input: HashMap<InlineStr, Object>,
        retry_count: i32,
        retry_task_id: InlineStr,
        task_id: InlineStr,
        decider: &'a DeciderService,
    ) -> Self {
        Self {
            workflow_model,
            workflow_task,
            task_input,
            retry_count,
            retry_task_id,
            task_id,
            decider,
        }
    }

    pub fn create_task_model(&self, status: TaskStatus) -> TaskModel {
        let mut task_model = TaskModel::new(status);
        task_model.reference_task_name = self.workflow_task.task_reference_name.clone();
        task_model.workflow_instance_id = self.workflow_model.workflow_id.clone();
        task_model.workflow_type = self.workflow_model.workflow_definition.name.clone();
        task_model.correlation_id = self.workflow_model.correlation_id.clone();
        task_model.scheduled_time = Utc::now().timestamp_millis();

        task_model.task_id = self.task_id.clone();
        task_model.workflow_task = Some(self.workflow_task.clone());
        task_model.workflow_priority = self.workflow_model.priority;

        task_model.task_type = self.workflow_task.type_.clone();
        task_model.task_def_name = self.workflow_task.name.clone();

        // system tasks with a registered definition are rate limited by it too
        if let Some(task_def) = &self.workflow_task.task_definition {
            task_model.rate_limit_per_frequency = task_def.rate_limit_per_frequency();
            task_model.rate_limit_frequency_in_seconds = task_def.rate_limit_frequency_in_seconds();
        }

        task_model
    }

    /// The definition embedded in the workflow task, else the registered one.
    pub fn task_definition(&self) -> RegorResult<Option<TaskDef>> {
        match &self.workflow_task.task_definition {
            Some(task_def) => Ok(Some(task_def.clone())),
            None => self.decider.get_task_def(&self.workflow_task.name),
        }
    }
}

impl fmt::Debug for TaskMapperContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskMapperContext")
            .field("workflow_id", &self.workflow_model.workflow_id)
            .field("task_reference_name", &self.workflow_task.task_reference_name)
            .field("task_type", &self.workflow_task.type_)
            .field("retry_count", &self.retry_count)
            .field("retry_task_id", &self.retry_task_id)
            .field("task_id", &self.task_id)
            .finish()
    }
}
