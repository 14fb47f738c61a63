use regor_common::prelude::*;
use regor_common::{TaskDef, TaskType, WorkflowDef, WorkflowTask};

use crate::dao::MetadataDao;
use crate::metrics::Monitors;
use crate::model::WorkflowModel;

/// Populates metadata definitions within workflow objects. Benefits of loading and populating
/// metadata definitions upfront could be:
///
/// - Immutable definitions within a workflow execution with the added benefit of guaranteeing
///   consistency at runtime.
/// - Stress is reduced on the storage layer
pub struct MetadataMapperService {
    metadata_dao: Arc<dyn MetadataDao>,
}

impl MetadataMapperService {
    pub fn new(metadata_dao: Arc<dyn MetadataDao>) -> Self {
        Self { metadata_dao }
    }

    /// The given version of a workflow definition, the latest one when no version is given.
    pub fn lookup_for_workflow_definition(
        &self,
        name: &str,
        version: Option<i32>,
    ) -> RegorResult<Arc<WorkflowDef>> {
        let potential_def = match version {
            Some(version) => self.metadata_dao.get_workflow_def(name, version)?,
            None => self.metadata_dao.get_latest_workflow_def(name)?,
        };

        potential_def.ok_or_else(|| {
            error!(
                "There is no workflow defined with name {} and version {:?}",
                name, version
            );
            ErrorCode::NotFound(format!(
                "No such workflow defined. name={}, version={:?}",
                name, version
            ))
        })
    }

    pub fn lookup_task_definition(&self, name: &str) -> RegorResult<Option<TaskDef>> {
        self.metadata_dao.get_task_def(name)
    }

    /// Replaces the definition of a workflow by a copy with every task definition populated.
    pub fn populate_workflow_with_definitions(
        &self,
        workflow: &mut WorkflowModel,
    ) -> RegorResult<()> {
        let mut workflow_definition = workflow.workflow_definition.as_ref().clone();
        self.populate_task_definitions(&mut workflow_definition)?;
        workflow.workflow_definition = Arc::new(workflow_definition);
        Ok(())
    }

    pub fn populate_task_definitions(&self, workflow_definition: &mut WorkflowDef) -> RegorResult<()> {
        workflow_definition.populate_tasks(&mut |workflow_task: &mut WorkflowTask| {
            self.populate_workflow_task_with_definition(workflow_task)
        })?;
        self.check_not_empty_definitions(workflow_definition)
    }

    fn populate_workflow_task_with_definition(
        &self,
        workflow_task: &mut WorkflowTask,
    ) -> RegorResult<()> {
        if Self::should_populate_task_definition(workflow_task) {
            workflow_task.task_definition = self.metadata_dao.get_task_def(&workflow_task.name)?;
        }
        if workflow_task.task_type() == TaskType::SubWorkflow {
            self.populate_version_for_sub_workflow(workflow_task)?;
        }
        Ok(())
    }

    fn populate_version_for_sub_workflow(&self, workflow_task: &mut WorkflowTask) -> RegorResult<()> {
        let sub_workflow_params = match workflow_task.sub_workflow_param.as_mut() {
            Some(params) => params,
            None => return Ok(()),
        };
        if sub_workflow_params.version.is_some() || sub_workflow_params.workflow_definition.is_some()
        {
            return Ok(());
        }

        match self
            .metadata_dao
            .get_latest_workflow_def(&sub_workflow_params.name)?
        {
            Some(sub_workflow_def) => {
                sub_workflow_params.version = Some(sub_workflow_def.version);
                Ok(())
            }
            None => {
                error!(
                    "The Task {} defined as a sub-workflow has no workflow definition available",
                    sub_workflow_params.name
                );
                fmt_err!(
                    TerminateWorkflow,
                    "The Task {} defined as a sub-workflow has no workflow definition available",
                    sub_workflow_params.name
                )
            }
        }
    }

    fn check_not_empty_definitions(&self, workflow_definition: &WorkflowDef) -> RegorResult<()> {
        // Obtain the names of the tasks with missing definitions
        let missing_task_definition_names = workflow_definition
            .collect_tasks()
            .into_iter()
            .filter(|x| x.task_type() == TaskType::Simple)
            .filter(|x| Self::should_populate_task_definition(x))
            .map(|x| x.name.clone())
            .collect::<Vec<_>>();
        if missing_task_definition_names.is_empty() {
            return Ok(());
        }

        error!(
            "Cannot find the task definitions for the following tasks used in workflow: {:?}",
            missing_task_definition_names
        );
        Monitors::record_workflow_start_error(
            &workflow_definition.name,
            &workflow_definition.owner_app,
        );
        fmt_err!(
            IllegalArgument,
            "Cannot find the task definitions for the following tasks used in workflow: {:?}",
            missing_task_definition_names
        )
    }

    fn should_populate_task_definition(workflow_task: &WorkflowTask) -> bool {
        workflow_task.task_definition.is_none() && !workflow_task.name.trim().is_empty()
    }
}
