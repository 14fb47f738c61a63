use dashmap::DashMap;
use regor_common::prelude::*;
use regor_common::{TaskDef, WorkflowDef};

/// Data access layer for the workflow metadata: task definitions and workflow definitions.
pub trait MetadataDao: Send + Sync {
    fn create_task_def(&self, task_def: TaskDef) -> RegorResult<()>;

    fn update_task_def(&self, task_def: TaskDef) -> RegorResult<()>;

    fn get_task_def(&self, name: &str) -> RegorResult<Option<TaskDef>>;

    fn get_all_task_defs(&self) -> RegorResult<Vec<TaskDef>>;

    fn remove_task_def(&self, name: &str) -> RegorResult<()>;

    /// Fails with `Conflict` if the name and version are already registered.
    fn create_workflow_def(&self, workflow_def: WorkflowDef) -> RegorResult<()>;

    fn update_workflow_def(&self, workflow_def: WorkflowDef) -> RegorResult<()>;

    fn get_workflow_def(&self, name: &str, version: i32) -> RegorResult<Option<Arc<WorkflowDef>>>;

    fn get_latest_workflow_def(&self, name: &str) -> RegorResult<Option<Arc<WorkflowDef>>>;

    fn get_all_versions(&self, name: &str) -> RegorResult<Vec<Arc<WorkflowDef>>>;

    fn remove_workflow_def(&self, name: &str, version: i32) -> RegorResult<()>;

    /// The latest version of every registered workflow.
    fn get_all_workflow_defs(&self) -> RegorResult<Vec<Arc<WorkflowDef>>>;
}

#[derive(Default)]
pub struct InMemoryMetadataDao {
    task_defs: DashMap<InlineStr, TaskDef>,
    workflow_defs: DashMap<InlineStr, BTreeMap<i32, Arc<WorkflowDef>>>,
}

impl InMemoryMetadataDao {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_or_update_task_def(&self, task_def: TaskDef) {
        self.task_defs.insert(task_def.name.clone(), task_def);
    }

    fn insert_or_update_workflow_def(&self, workflow_def: WorkflowDef) {
        self.workflow_defs
            .entry(workflow_def.name.clone())
            .or_default()
            .insert(workflow_def.version, Arc::new(workflow_def));
    }
}

impl MetadataDao for InMemoryMetadataDao {
    fn create_task_def(&self, task_def: TaskDef) -> RegorResult<()> {
        self.insert_or_update_task_def(task_def);
        Ok(())
    }

    fn update_task_def(&self, task_def: TaskDef) -> RegorResult<()> {
        self.insert_or_update_task_def(task_def);
        Ok(())
    }

    fn get_task_def(&self, name: &str) -> RegorResult<Option<TaskDef>> {
        Ok(self.task_defs.get(name).map(|x| x.clone()))
    }

    fn get_all_task_defs(&self) -> RegorResult<Vec<TaskDef>> {
        Ok(self.task_defs.iter().map(|x| x.value().clone()).collect())
    }

    fn remove_task_def(&self, name: &str) -> RegorResult<()> {
        if self.task_defs.remove(name).is_none() {
            fmt_err!(
                NotFound,
                "Cannot remove the task: {} - no such task definition",
                name
            )
        } else {
            Ok(())
        }
    }

    fn create_workflow_def(&self, workflow_def: WorkflowDef) -> RegorResult<()> {
        let exists = self
            .workflow_defs
            .get(&workflow_def.name)
            .map(|x| x.contains_key(&workflow_def.version))
            .unwrap_or(false);
        if exists {
            fmt_err!(
                Conflict,
                "Workflow with {}/{} already exists!",
                workflow_def.name,
                workflow_def.version
            )
        } else {
            self.insert_or_update_workflow_def(workflow_def);
            Ok(())
        }
    }

    fn update_workflow_def(&self, workflow_def: WorkflowDef) -> RegorResult<()> {
        self.insert_or_update_workflow_def(workflow_def);
        Ok(())
    }

    fn get_workflow_def(&self, name: &str, version: i32) -> RegorResult<Option<Arc<WorkflowDef>>> {
        Ok(self
            .workflow_defs
            .get(name)
            .and_then(|x| x.get(&version).cloned()))
    }

    fn get_latest_workflow_def(&self, name: &str) -> RegorResult<Option<Arc<WorkflowDef>>> {
        Ok(self
            .workflow_defs
            .get(name)
            .and_then(|x| x.values().next_back().cloned()))
    }

    fn get_all_versions(&self, name: &str) -> RegorResult<Vec<Arc<WorkflowDef>>> {
        Ok(self
            .workflow_defs
            .get(name)
            .map(|x| x.values().cloned().collect())
            .unwrap_or_default())
    }

    fn remove_workflow_def(&self, name: &str, version: i32) -> RegorResult<()> {
        let removed = self
            .workflow_defs
            .get_mut(name)
            .and_then(|mut x| x.remove(&version));
        if removed.is_none() {
            return fmt_err!(
                NotFound,
                "Cannot remove the workflow - no such workflow definition: {} version: {}",
                name,
                version
            );
        }
        // drop the name once no version is left
        self.workflow_defs.remove_if(name, |_, versions| versions.is_empty());
        Ok(())
    }

    fn get_all_workflow_defs(&self) -> RegorResult<Vec<Arc<WorkflowDef>>> {
        Ok(self
            .workflow_defs
            .iter()
            .filter_map(|x| x.values().next_back().cloned())
            .collect())
    }
}
