use either::Either;
use fancy_regex::Regex;
use regor_common::prelude::*;
use regor_common::{EnvUtils, TaskDef, WorkflowDef};

use crate::model::{TaskModel, WorkflowModel};

type DocumentContext = Either<HashMap<InlineStr, Object>, serde_json::Value>;

/// Used to parse and resolve the `${...}` bindings in the workflow and task definitions.
pub struct ParametersUtils;

impl ParametersUtils {
    pub fn get_task_input(
        input_params: &HashMap<InlineStr, Object>,
        workflow: &WorkflowModel,
        task_definition: Option<&TaskDef>,
        task_id: Option<&str>,
    ) -> RegorResult<HashMap<InlineStr, Object>> {
        let mut input_params = input_params.clone();
        if let Some(task_definition) = task_definition {
            for (k, v) in &task_definition.input_template {
                input_params.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }

        let mut document_context = Either::Left(Self::build_document(workflow));
        let mut replaced_task_input = Self::replace(input_params, &mut document_context, task_id);
        if let Some(task_definition) = task_definition {
            // a key resolving to null falls back to the one from the input template
            for (k, v) in replaced_task_input.iter_mut() {
                if v.is_null() {
                    if let Some(value) = task_definition.input_template.get(k) {
                        *v = value.clone();
                    }
                }
            }
        }
        Ok(replaced_task_input)
    }

    /// Resolves a template against the workflow alone, e.g. the output parameters of a workflow.
    pub fn replace_with_workflow(
        input: &HashMap<InlineStr, Object>,
        workflow: &WorkflowModel,
    ) -> HashMap<InlineStr, Object> {
        let mut document_context = Either::Left(Self::build_document(workflow));
        Self::replace(input.clone(), &mut document_context, None)
    }

    /// Resolves a template against an arbitrary json document.
    pub fn replace_with_document(
        input: &HashMap<InlineStr, Object>,
        document: HashMap<InlineStr, Object>,
    ) -> HashMap<InlineStr, Object> {
        let mut document_context = Either::Left(document);
        Self::replace(input.clone(), &mut document_context, None)
    }

    fn build_document(workflow: &WorkflowModel) -> HashMap<InlineStr, Object> {
        let workflow_params = object_map! {
            "input" => workflow.input.clone(),
            "output" => workflow.output.clone(),
            "status" => workflow.status.as_ref(),
            "workflowId" => &workflow.workflow_id,
            "parentWorkflowId" => &workflow.parent_workflow_id,
            "parentWorkflowTaskId" => &workflow.parent_workflow_task_id,
            "workflowType" => &workflow.workflow_definition.name,
            "version" => workflow.workflow_definition.version,
            "correlationId" => &workflow.correlation_id,
            "reasonForIncompletion" => &workflow.reason_for_incompletion,
            "schemaVersion" => workflow.workflow_definition.schema_version,
            "variables" => workflow.variables.clone(),
        };

        let mut input_map = object_map! { "workflow" => workflow_params };
        // later tasks overwrite earlier ones, so a reference resolves to its latest attempt
        for task in &workflow.tasks {
            input_map.insert(
                task.ref_name_without_iteration().into(),
                Self::task_params(task).into(),
            );
        }
        input_map
    }

    fn task_params(task: &TaskModel) -> HashMap<InlineStr, Object> {
        object_map! {
            "input" => task.input_data.clone(),
            "output" => task.output_data.clone(),
            "taskType" => &task.task_type,
            "status" => task.status.as_ref(),
            "referenceTaskName" => &task.reference_task_name,
            "retryCount" => task.retry_count,
            "correlationId" => &task.correlation_id,
            "pollCount" => task.poll_count,
            "taskDefName" => &task.task_def_name,
            "scheduledTime" => task.scheduled_time,
            "startTime" => task.start_time,
            "endTime" => task.end_time,
            "workflowInstanceId" => &task.workflow_instance_id,
            "taskId" => &task.task_id,
            "reasonForIncompletion" => &task.reason_for_incompletion,
            "callbackAfterSeconds" => task.callback_after_seconds,
            "workerId" => &task.worker_id,
            "iteration" => task.iteration,
        }
    }

    fn replace(
        input: HashMap<InlineStr, Object>,
        document_context: &mut DocumentContext,
        task_id: Option<&str>,
    ) -> HashMap<InlineStr, Object> {
        input
            .into_iter()
            .map(|(k, v)| (k, Self::replace_value(v, document_context, task_id)))
            .collect()
    }

    fn replace_value(
        value: Object,
        document_context: &mut DocumentContext,
        task_id: Option<&str>,
    ) -> Object {
        match value {
            Object::String(value) => Self::replace_variables(&value, document_context, task_id),
            Object::Map(value) => Self::replace(value, document_context, task_id).into(),
            Object::List(value) => value
                .into_iter()
                .map(|v| Self::replace_value(v, document_context, task_id))
                .collect::<Vec<_>>()
                .into(),
            v => v,
        }
    }

    fn replace_variables(
        param_string: &str,
        document_context: &mut DocumentContext,
        task_id: Option<&str>,
    ) -> Object {
        lazy_static! {
            static ref DOLLAR_REGEX: Regex =
                Regex::new(r"(?=(?<!\$)\$\{)|(?<=})").expect("regex compile error");
        }

        if param_string.is_empty() {
            return Object::String(InlineStr::new());
        }

        let mut values = Vec::default();
        let mut last = 0;
        for m in DOLLAR_REGEX.find_iter(param_string) {
            match m {
                Ok(m) => {
                    if last != m.start() {
                        values.push(&param_string[last..m.start()]);
                    }
                    last = m.end();
                }
                Err(e) => error!("regex match failed on {}, error: {}", param_string, e),
            }
        }
        if last < param_string.len() {
            values.push(&param_string[last..]);
        }

        let mut converted_values: Vec<Object> = Vec::with_capacity(values.len());
        for v in values {
            if v.starts_with("${") && v.ends_with('}') {
                let param_path = v[2..v.len() - 1].trim();
                // ${} or ${  } resolves to an empty string
                if param_path.is_empty() {
                    converted_values.push(Object::String(InlineStr::new()));
                    continue;
                }
                if EnvUtils::is_environment_variable(param_path) {
                    if let Some(sys_value) =
                        EnvUtils::get_system_parameters_value(param_path, task_id)
                    {
                        converted_values.push(sys_value.into());
                        continue;
                    }
                }
                converted_values.push(Object::read(document_context, param_path));
            } else if v.contains("$${") {
                converted_values.push(v.replace("$${", "${").into());
            } else {
                converted_values.push(v.into());
            }
        }

        // "a ${x} b" is stitched back into one string
        if converted_values.len() > 1 {
            let mut stitched = InlineStr::new();
            for value in converted_values {
                if !value.is_null() {
                    stitched.push_str(&value.to_string());
                }
            }
            return stitched.into();
        }

        converted_values.pop().unwrap_or_default()
    }

    /// Fills the absent keys of a workflow input with the defaults of the definition.
    pub fn get_workflow_input(
        workflow_def: &WorkflowDef,
        input_params: &mut HashMap<InlineStr, Object>,
    ) {
        for (k, v) in &workflow_def.input_template {
            input_params.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use regor_common::prelude::*;
    use regor_common::{TaskDef, WorkflowDef};

    use super::ParametersUtils;
    use crate::model::{TaskModel, TaskStatus, WorkflowModel};
    use crate::runtime::StartWorkflowInput;

    fn workflow() -> WorkflowModel {
        let mut workflow = WorkflowModel::new(
            "wf-1".into(),
            Arc::new(WorkflowDef::new("order", 2)),
            StartWorkflowInput::default(),
        );
        workflow.input = object_map! { "orderId" => 42, "region" => "eu" };
        workflow.variables = object_map! { "count" => 3 };

        let mut task = TaskModel::new(TaskStatus::Completed);
        task.reference_task_name = "fetch__2".into();
        task.iteration = 2;
        task.output_data = object_map! { "items" => vec![Object::from("a"), Object::from("b")] };
        workflow.tasks.push(task);
        workflow
    }

    #[test]
    fn resolves_workflow_and_task_references() {
        let input = object_map! {
            "order" => "${workflow.input.orderId}",
            "first" => "${fetch.output.items[0]}",
            "label" => "order-${workflow.input.orderId}-${workflow.input.region}",
            "count" => "${workflow.variables.count}",
            "nested" => object_map! { "type" => "${workflow.workflowType}" },
            "escaped" => "$${workflow.input.orderId}",
            "blank" => "${ }",
            "missing" => "${workflow.input.nothing}",
            "empty" => "",
        };
        let resolved = ParametersUtils::get_task_input(&input, &workflow(), None, None).unwrap();

        assert_eq!(resolved["order"], Object::Int(42));
        assert_eq!(resolved["first"], Object::from("a"));
        assert_eq!(resolved["label"], Object::from("order-42-eu"));
        assert_eq!(resolved["count"], Object::Int(3));
        assert_eq!(
            resolved["nested"].as_map().unwrap()["type"],
            Object::from("order")
        );
        assert_eq!(resolved["escaped"], Object::from("${workflow.input.orderId}"));
        assert_eq!(resolved["blank"], Object::from(""));
        assert_eq!(resolved["missing"], Object::Null);
        assert_eq!(resolved["empty"], Object::from(""));
    }

    #[test]
    fn input_template_fills_absent_and_null_keys() {
        let mut task_def = TaskDef::new("fetch");
        task_def.input_template = object_map! { "retries" => 5, "missing" => "fallback" };
        let input = object_map! { "missing" => "${workflow.input.nothing}" };

        let resolved =
            ParametersUtils::get_task_input(&input, &workflow(), Some(&task_def), Some("t-1"))
                .unwrap();
        assert_eq!(resolved["retries"], Object::Int(5));
        assert_eq!(resolved["missing"], Object::from("fallback"));
    }

    #[test]
    fn system_parameter_task_id() {
        let input = object_map! { "id" => "${REGOR_TASK_ID}" };
        let resolved =
            ParametersUtils::get_task_input(&input, &workflow(), None, Some("t-9")).unwrap();
        assert_eq!(resolved["id"], Object::from("t-9"));
    }
}
