use chrono::Utc;
use regor_common::prelude::*;
use regor_common::{TaskType, WorkflowTask};

use super::switch_task_mapper::schedule_selected_case;
use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::runtime::execution::evaluators::JavascriptEvaluator;

/// Maps a `TaskType::Decision`, the predecessor of SWITCH: the case value is either the value of
/// the input parameter named by `caseValueParam`, or the result of the javascript
/// `caseExpression`.
pub struct DecisionTaskMapper;

impl TaskMapper for DecisionTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Decision
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in DecisionTaskMapper",
            task_mapper_context
        );

        let case_value = Self::get_evaluated_case_value(&task_mapper_context)?;

        let mut decision_task = task_mapper_context.create_task_model(TaskStatus::InProgress);
        decision_task.task_type = TaskType::Decision.as_ref().into();
        decision_task.task_def_name = TaskType::Decision.as_ref().into();
        decision_task.add_input("case", case_value.clone());
        decision_task.add_output("caseOutput", vec![Object::from(case_value.clone())]);
        decision_task.start_time = Utc::now().timestamp_millis();

        schedule_selected_case(&task_mapper_context, decision_task, &case_value)
    }
}

impl DecisionTaskMapper {
    fn get_evaluated_case_value(task_mapper_context: &TaskMapperContext) -> RegorResult<InlineStr> {
        let workflow_task: &WorkflowTask = task_mapper_context.workflow_task;
        let expression = workflow_task.case_expression.trim();

        if !expression.is_empty() {
            debug!(
                "Case being evaluated using decision expression: {}",
                expression
            );
            let evaluator = task_mapper_context
                .decider
                .evaluators()
                .get_evaluator(JavascriptEvaluator::NAME)
                .ok_or_else(|| {
                    ErrorCode::TerminateWorkflow(format!(
                        "No evaluator registered for type: {}",
                        JavascriptEvaluator::NAME
                    ))
                })?;
            let input = Object::Map(task_mapper_context.task_input.clone());
            evaluator
                .evaluate(expression, &input)
                .map(|x| x.to_string())
                .map_err(|e| {
                    let error_msg = format!("Error while evaluating script: {}", expression);
                    error!("{}, {}", error_msg, e);
                    ErrorCode::TerminateWorkflow(error_msg)
                })
        } else {
            debug!(
                "No Expression available on the decision task, case value being assigned as param name"
            );
            Ok(task_mapper_context
                .task_input
                .get(&workflow_task.case_value_param)
                .map(|x| x.to_string())
                .unwrap_or_else(|| "null".into()))
        }
    }
}
