use numtoa::NumToA;
use regor_common::prelude::*;
use regor_common::WorkflowDef;

use crate::external::WorkflowStatusListener;
use crate::metrics::Monitors;
use crate::model::WorkflowModel;
use crate::runtime::dal::ExecutionDaoFacade;
use crate::runtime::execution::{StartWorkflowInput, WorkflowExecutor};
use crate::runtime::metadata::MetadataMapperService;
use crate::service::ExecutionLockService;
use crate::utils::{IdGenerator, ParametersUtils};

/// Creates a new workflow instance and runs its first decide.
pub struct StartWorkflowOperation {
    metadata_mapper: Arc<MetadataMapperService>,
    execution_dao_facade: Arc<ExecutionDaoFacade>,
    execution_lock_service: Arc<ExecutionLockService>,
    workflow_status_listener: Option<Arc<dyn WorkflowStatusListener>>,
}

impl StartWorkflowOperation {
    pub fn new(
        metadata_mapper: Arc<MetadataMapperService>,
        execution_dao_facade: Arc<ExecutionDaoFacade>,
        execution_lock_service: Arc<ExecutionLockService>,
        workflow_status_listener: Option<Arc<dyn WorkflowStatusListener>>,
    ) -> Self {
        Self {
            metadata_mapper,
            execution_dao_facade,
            execution_lock_service,
            workflow_status_listener,
        }
    }

    pub fn execute(
        &self,
        mut input: StartWorkflowInput,
        executor: &WorkflowExecutor,
    ) -> RegorResult<InlineStr> {
        let mut workflow_definition = match input.workflow_definition.take() {
            Some(workflow_def) => workflow_def,
            None => self
                .metadata_mapper
                .lookup_for_workflow_definition(&input.name, input.version)?
                .as_ref()
                .clone(),
        };

        self.metadata_mapper
            .populate_task_definitions(&mut workflow_definition)?;

        // perform validations
        Self::validate_workflow(&workflow_definition)?;

        // Generate ID if it's not present
        let workflow_id = if input.workflow_id.trim().is_empty() {
            IdGenerator::generate()
        } else {
            input.workflow_id.clone()
        };

        let mut workflow_input = std::mem::take(&mut input.workflow_input);
        let external_input_payload_storage_path =
            std::mem::take(&mut input.external_input_payload_storage_path);

        let mut workflow =
            WorkflowModel::new(workflow_id.clone(), Arc::new(workflow_definition), input);
        if external_input_payload_storage_path.trim().is_empty() {
            ParametersUtils::get_workflow_input(&workflow.workflow_definition, &mut workflow_input);
            workflow.input = workflow_input;
        } else {
            workflow.external_input_payload_storage_path = external_input_payload_storage_path;
        }

        let (workflow_name, workflow_version, owner_app) = (
            workflow.workflow_definition.name.clone(),
            workflow.workflow_definition.version,
            workflow.owner_app.clone(),
        );
        match self.create_and_evaluate(workflow, executor) {
            Ok(()) => {
                Monitors::record_workflow_start_success(
                    &workflow_name,
                    workflow_version.numtoa_str(10, &mut [0; 16]),
                    &owner_app,
                );
                Ok(workflow_id)
            }
            Err(e) => {
                Monitors::record_workflow_start_error(&workflow_name, &owner_app);
                error!("Unable to start workflow: {}, error: {}", workflow_name, e);

                // It's possible the remove workflow call hits an error as well, in that case we
                // want to log both errors to help diagnosis.
                if let Err(e) = self.execution_dao_facade.remove_workflow(&workflow_id) {
                    error!(
                        "Could not remove the workflowId: {}, error: {}",
                        workflow_id, e
                    );
                }
                Err(e)
            }
        }
    }

    /// Acquire and hold the lock till the workflow creation action is completed.
    ///
    /// This is to ensure that workflow creation action precedes any other action on a given
    /// workflow.
    fn create_and_evaluate(
        &self,
        mut workflow: WorkflowModel,
        executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        let workflow_id = workflow.workflow_id.clone();
        if !self.execution_lock_service.acquire_lock(&workflow_id) {
            return fmt_err!(
                LockFailed,
                "Error acquiring lock when creating workflow: {}",
                workflow_id
            );
        }

        let result = self.create_and_decide(&mut workflow, executor);
        self.execution_lock_service.release_lock(&workflow_id);
        if workflow.status.is_terminal() {
            self.execution_lock_service.delete_lock(&workflow_id);
        }
        result
    }

    fn create_and_decide(
        &self,
        workflow: &mut WorkflowModel,
        executor: &WorkflowExecutor,
    ) -> RegorResult<()> {
        self.execution_dao_facade.create_workflow(workflow)?;
        debug!(
            "A new instance of workflow: {} created with id: {}",
            workflow.workflow_definition.name, workflow.workflow_id
        );
        self.execution_dao_facade
            .populate_workflow_and_task_payload_data(workflow)?;

        if let Some(listener) = &self.workflow_status_listener {
            listener.on_workflow_started(workflow);
        }
        executor.decide_with_lock(workflow)
    }

    /// Performs validations for starting a workflow
    fn validate_workflow(workflow_def: &WorkflowDef) -> RegorResult<()> {
        workflow_def.validate().map_err(|e| {
            error!(
                "The definition of workflow '{}' is not valid: {}",
                workflow_def.name, e
            );
            Monitors::record_workflow_start_error(&workflow_def.name, &workflow_def.owner_app);
            e
        })
    }
}
