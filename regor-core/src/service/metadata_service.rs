use chrono::Utc;
use regor_common::prelude::*;
use regor_common::{EventHandler, TaskDef, WorkflowDef};

use crate::dao::{EventHandlerDao, MetadataDao};

/// Registration and lookup of task definitions, workflow definitions and event handlers.
pub struct MetadataService {
    metadata_dao: Arc<dyn MetadataDao>,
    event_handler_dao: Arc<dyn EventHandlerDao>,
}

impl MetadataService {
    pub fn new(metadata_dao: Arc<dyn MetadataDao>, event_handler_dao: Arc<dyn EventHandlerDao>) -> Self {
        Self {
            metadata_dao,
            event_handler_dao,
        }
    }

    // ******************************************
    // *************** Workflow *****************
    // ******************************************

    /// The Workflow Definition contains all the information necessary to define the behavior of a
    /// workflow. Fails with `Conflict` if the version is already registered.
    pub fn register_workflow_def(&self, workflow_def: WorkflowDef) -> RegorResult<()> {
        workflow_def.validate()?;
        self.metadata_dao.create_workflow_def(workflow_def)
    }

    /// Creates or replaces each of the definitions.
    pub fn update_workflow_defs(&self, workflow_defs: Vec<WorkflowDef>) -> RegorResult<()> {
        for workflow_def in &workflow_defs {
            workflow_def.validate()?;
        }
        for workflow_def in workflow_defs {
            self.metadata_dao.update_workflow_def(workflow_def)?;
        }
        Ok(())
    }

    /// The given version of the workflow, the latest when `version` is none.
    pub fn get_workflow_def(&self, name: &str, version: Option<i32>) -> RegorResult<Arc<WorkflowDef>> {
        let workflow_def = match version {
            Some(version) => self.metadata_dao.get_workflow_def(name, version)?,
            None => self.metadata_dao.get_latest_workflow_def(name)?,
        };
        workflow_def.ok_or_else(|| {
            ErrorCode::NotFound(format!(
                "No such workflow found by name: {}, version: {:?}",
                name, version
            ))
        })
    }

    pub fn get_workflow_defs(&self) -> RegorResult<Vec<Arc<WorkflowDef>>> {
        self.metadata_dao.get_all_workflow_defs()
    }

    pub fn unregister_workflow_def(&self, name: &str, version: i32) -> RegorResult<()> {
        self.metadata_dao.remove_workflow_def(name, version)
    }

    // ******************************************
    // ***************** Task *******************
    // ******************************************

    /// Task Definitions are used to register SIMPLE tasks (workers).
    pub fn register_task_defs(&self, task_defs: Vec<TaskDef>, client_app: &str) -> RegorResult<()> {
        for task_def in &task_defs {
            task_def.validate()?;
        }
        for mut task_def in task_defs {
            task_def.created_by = client_app.into();
            task_def.create_time = Utc::now().timestamp_millis();
            task_def.updated_by = InlineStr::default();
            task_def.update_time = 0;
            self.metadata_dao.create_task_def(task_def)?;
        }
        Ok(())
    }

    pub fn update_task_def(&self, mut task_def: TaskDef, client_app: &str) -> RegorResult<()> {
        task_def.validate()?;
        let existing = match self.metadata_dao.get_task_def(&task_def.name)? {
            Some(existing) => existing,
            None => return fmt_err!(NotFound, "No such task by name {}", task_def.name),
        };
        task_def.created_by = existing.created_by;
        task_def.create_time = existing.create_time;
        task_def.updated_by = client_app.into();
        task_def.update_time = Utc::now().timestamp_millis();
        self.metadata_dao.update_task_def(task_def)
    }

    pub fn get_task_def(&self, name: &str) -> RegorResult<TaskDef> {
        self.metadata_dao
            .get_task_def(name)?
            .ok_or_else(|| ErrorCode::NotFound(format!("No such taskType found by name: {}", name)))
    }

    pub fn get_task_defs(&self) -> RegorResult<Vec<TaskDef>> {
        self.metadata_dao.get_all_task_defs()
    }

    pub fn unregister_task_def(&self, name: &str) -> RegorResult<()> {
        self.metadata_dao.remove_task_def(name)
    }

    // ******************************************
    // *************** Event ********************
    // ******************************************

    pub fn add_event_handler(&self, event_handler: EventHandler) -> RegorResult<()> {
        event_handler.validate()?;
        self.event_handler_dao.add_event_handler(event_handler)
    }

    pub fn update_event_handler(&self, event_handler: EventHandler) -> RegorResult<()> {
        event_handler.validate()?;
        self.event_handler_dao.update_event_handler(event_handler)
    }

    pub fn remove_event_handler(&self, name: &str) -> RegorResult<()> {
        self.event_handler_dao.remove_event_handler(name)
    }

    pub fn get_all_event_handlers(&self) -> RegorResult<Vec<EventHandler>> {
        self.event_handler_dao.get_all_event_handlers()
    }

    pub fn get_event_handlers_for_event(
        &self,
        event: &str,
        active_only: bool,
    ) -> RegorResult<Vec<EventHandler>> {
        self.event_handler_dao
            .get_event_handlers_for_event(event, active_only)
    }
}
