use regor_common::prelude::*;

use crate::config::Properties;
use crate::external::{ExternalPayloadStorage, Operation, PayloadType};
use crate::metrics::Monitors;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};

/// Moves large payloads to the external storage and back.
///
/// Without a storage configured payloads always stay inline, only the hard limits apply.
pub struct ExternalPayloadStorageUtils {
    storage: Option<Arc<dyn ExternalPayloadStorage>>,
    properties: Arc<Properties>,
}

impl ExternalPayloadStorageUtils {
    pub fn new(
        storage: Option<Arc<dyn ExternalPayloadStorage>>,
        properties: Arc<Properties>,
    ) -> Self {
        Self {
            storage,
            properties,
        }
    }

    pub fn download_payload(&self, path: &str) -> RegorResult<HashMap<InlineStr, Object>> {
        let storage = self.storage.as_ref().ok_or_else(|| {
            ErrorCode::NonTransient(format!(
                "No external payload storage configured to download: {}",
                path
            ))
        })?;
        let bytes = storage.download(path).map_err(|e| {
            error!(
                "Unable to download payload from external storage path: {}, error: {}",
                path, e
            );
            if e.is_transient() {
                e
            } else {
                ErrorCode::NonTransient(format!(
                    "Unable to download payload from external storage path: {}",
                    path
                ))
            }
        })?;
        let json: serde_json::Value = serde_json::from_slice(&bytes)?;
        match json {
            serde_json::Value::Object(map) => Ok(Object::convert_jsonmap_to_hashmap(&map)),
            _ => fmt_err!(NonTransient, "Payload at {} is not a json object", path),
        }
    }

    /// Restores the externalized input and output of a task.
    pub fn internalize_task(&self, task: &mut TaskModel) -> RegorResult<()> {
        if !task.external_input_payload_storage_path.is_empty() {
            task.input_data = self.download_payload(&task.external_input_payload_storage_path)?;
            Monitors::record_external_payload_storage_usage(
                &task.task_def_name,
                Operation::Read,
                PayloadType::TaskInput,
            );
            task.external_input_payload_storage_path = InlineStr::new();
        }
        if !task.external_output_payload_storage_path.is_empty() {
            task.output_data =
                self.download_payload(&task.external_output_payload_storage_path)?;
            Monitors::record_external_payload_storage_usage(
                &task.task_def_name,
                Operation::Read,
                PayloadType::TaskOutput,
            );
            task.external_output_payload_storage_path = InlineStr::new();
        }
        Ok(())
    }

    pub fn internalize_workflow(&self, workflow: &mut WorkflowModel) -> RegorResult<()> {
        if !workflow.external_input_payload_storage_path.is_empty() {
            workflow.input = self.download_payload(&workflow.external_input_payload_storage_path)?;
            workflow.external_input_payload_storage_path = InlineStr::new();
        }
        if !workflow.external_output_payload_storage_path.is_empty() {
            workflow.output =
                self.download_payload(&workflow.external_output_payload_storage_path)?;
            workflow.external_output_payload_storage_path = InlineStr::new();
        }
        Ok(())
    }

    /// A task whose payload exceeds the hard limit fails terminally with an emptied payload.
    pub fn verify_and_upload_task(
        &self,
        task: &mut TaskModel,
        payload_type: PayloadType,
    ) -> RegorResult<()> {
        let (payload, threshold, max_threshold) = match payload_type {
            PayloadType::TaskInput => (
                &task.input_data,
                self.properties.task_input_payload_size_threshold_kb,
                self.properties.max_task_input_payload_size_threshold_kb,
            ),
            PayloadType::TaskOutput => (
                &task.output_data,
                self.properties.task_output_payload_size_threshold_kb,
                self.properties.max_task_output_payload_size_threshold_kb,
            ),
            _ => return fmt_err!(IllegalArgument, "not a task payload: {}", payload_type.as_ref()),
        };
        if payload.is_empty() {
            return Ok(());
        }

        let bytes = Object::convert_hashmap_to_json(payload).to_string().into_bytes();
        let max_threshold_in_bytes = max_threshold * 1024;
        if bytes.len() > max_threshold_in_bytes {
            let error_msg = format!(
                "The payload size: {} of task: {} in workflow: {} is greater than the permissible limit: {} bytes",
                bytes.len(),
                task.task_id,
                task.workflow_instance_id,
                max_threshold_in_bytes
            );
            error!("{}", error_msg);
            task.set_failed(TaskStatus::FailedWithTerminalError, error_msg);
            if payload_type == PayloadType::TaskInput {
                task.input_data.clear();
            } else {
                task.output_data.clear();
            }
        } else if bytes.len() > threshold * 1024 {
            if let Some(path) = self.upload(&bytes, payload_type, &task.workflow_instance_id)? {
                if payload_type == PayloadType::TaskInput {
                    task.input_data.clear();
                    task.external_input_payload_storage_path = path;
                } else {
                    task.output_data.clear();
                    task.external_output_payload_storage_path = path;
                }
                Monitors::record_external_payload_storage_usage(
                    &task.task_def_name,
                    Operation::Write,
                    payload_type,
                );
            }
        }
        Ok(())
    }

    /// A workflow whose payload exceeds the hard limit is terminated: the error returned is
    /// `TerminateWorkflow`.
    pub fn verify_and_upload_workflow(
        &self,
        workflow: &mut WorkflowModel,
        payload_type: PayloadType,
    ) -> RegorResult<()> {
        let (payload, threshold, max_threshold) = match payload_type {
            PayloadType::WorkflowInput => (
                &workflow.input,
                self.properties.workflow_input_payload_size_threshold_kb,
                self.properties.max_workflow_input_payload_size_threshold_kb,
            ),
            PayloadType::WorkflowOutput => (
                &workflow.output,
                self.properties.workflow_output_payload_size_threshold_kb,
                self.properties.max_workflow_output_payload_size_threshold_kb,
            ),
            _ => {
                return fmt_err!(
                    IllegalArgument,
                    "not a workflow payload: {}",
                    payload_type.as_ref()
                )
            }
        };
        if payload.is_empty() {
            return Ok(());
        }

        let bytes = Object::convert_hashmap_to_json(payload).to_string().into_bytes();
        let max_threshold_in_bytes = max_threshold * 1024;
        if bytes.len() > max_threshold_in_bytes {
            let error_msg = format!(
                "The payload size: {} of workflow: {} is greater than the permissible limit: {} bytes",
                bytes.len(),
                workflow.workflow_id,
                max_threshold_in_bytes
            );
            error!("{}", error_msg);
            if payload_type == PayloadType::WorkflowInput {
                workflow.input.clear();
            } else {
                workflow.output.clear();
            }
            return str_err!(TerminateWorkflow, error_msg);
        } else if bytes.len() > threshold * 1024 {
            if let Some(path) = self.upload(&bytes, payload_type, &workflow.workflow_id)? {
                if payload_type == PayloadType::WorkflowInput {
                    workflow.input.clear();
                    workflow.external_input_payload_storage_path = path;
                } else {
                    workflow.output.clear();
                    workflow.external_output_payload_storage_path = path;
                }
                Monitors::record_external_payload_storage_usage(
                    &workflow.workflow_definition.name,
                    Operation::Write,
                    payload_type,
                );
            }
        }
        Ok(())
    }

    fn upload(
        &self,
        bytes: &[u8],
        payload_type: PayloadType,
        workflow_id: &str,
    ) -> RegorResult<Option<InlineStr>> {
        let storage = match &self.storage {
            Some(storage) => storage,
            None => return Ok(None),
        };
        let location = storage.get_location(Operation::Write, payload_type, "")?;
        storage.upload(&location.path, bytes).map_err(|e| {
            error!(
                "Unable to upload payload to external storage for workflow: {}, error: {}",
                workflow_id, e
            );
            if e.is_transient() {
                e
            } else {
                ErrorCode::NonTransient(format!(
                    "Unable to upload payload to external storage for workflow: {}",
                    workflow_id
                ))
            }
        })?;
        Ok(Some(location.path))
    }
}

#[cfg(test)]
mod tests {
    use regor_common::prelude::*;

    use super::ExternalPayloadStorageUtils;
    use crate::config::Properties;
    use crate::external::{InMemoryPayloadStorage, PayloadType};
    use crate::model::{TaskModel, TaskStatus};

    fn properties() -> Arc<Properties> {
        Arc::new(Properties {
            task_output_payload_size_threshold_kb: 1,
            max_task_output_payload_size_threshold_kb: 4,
            ..Properties::default()
        })
    }

    fn task_with_output(size: usize) -> TaskModel {
        let mut task = TaskModel::new(TaskStatus::Completed);
        task.task_id = "t-1".into();
        task.workflow_instance_id = "wf-1".into();
        task.add_output("blob", "x".repeat(size));
        task
    }

    #[test]
    fn large_output_is_externalized_and_restored() {
        let storage = Arc::new(InMemoryPayloadStorage::new());
        let utils = ExternalPayloadStorageUtils::new(Some(storage.clone()), properties());

        let mut task = task_with_output(2048);
        utils
            .verify_and_upload_task(&mut task, PayloadType::TaskOutput)
            .unwrap();
        assert!(task.output_data.is_empty());
        assert!(!task.external_output_payload_storage_path.is_empty());
        assert_eq!(storage.len(), 1);

        utils.internalize_task(&mut task).unwrap();
        assert_eq!(task.output_data["blob"].as_string().unwrap().len(), 2048);
    }

    #[test]
    fn payload_over_hard_limit_fails_task() {
        let utils = ExternalPayloadStorageUtils::new(None, properties());
        let mut task = task_with_output(8192);
        utils
            .verify_and_upload_task(&mut task, PayloadType::TaskOutput)
            .unwrap();
        assert_eq!(task.status, TaskStatus::FailedWithTerminalError);
        assert!(task.output_data.is_empty());

        let mut small = task_with_output(2048);
        utils
            .verify_and_upload_task(&mut small, PayloadType::TaskOutput)
            .unwrap();
        assert_eq!(small.output_data.len(), 1);
    }
}
