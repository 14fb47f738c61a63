use chrono::Utc;
use regor_common::prelude::*;
use regor_common::{TaskType, WorkflowTask};

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};

/// An implementation of `TaskMapper` to map a `WorkflowTask` of type `TaskType::Switch` to a List
/// `TaskModel` starting with Task of type `TaskType::Switch` which is marked as InProgress,
/// followed by the list of `TaskModel` based on the case expression evaluation in the Switch task.
pub struct SwitchTaskMapper;

impl TaskMapper for SwitchTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Switch
    }

    /// This method gets the list of tasks that need to scheduled when the task to scheduled is of
    /// type `TaskType::Switch`.
    ///
    /// return List of tasks in the following order:
    /// - `TaskType::Switch` with `TaskStatus::InProgress`
    /// - List of tasks based on the evaluation of `WorkflowTask::evaluator_type` and
    ///   `WorkflowTask::expression` are scheduled.
    /// - In the case of no matching `WorkflowTask::evaluator_type`, workflow will be terminated
    ///   with error message. In case of no matching result after the evaluation of the
    ///   `WorkflowTask::expression`, the `WorkflowTask::default_case` Tasks are scheduled.
    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in SwitchTaskMapper",
            task_mapper_context
        );

        let workflow_task = task_mapper_context.workflow_task;

        // get the expression to be evaluated
        let evaluator = match task_mapper_context
            .decider
            .evaluators()
            .get_evaluator(&workflow_task.evaluator_type)
        {
            Some(evaluator) => evaluator,
            None => {
                error!(
                    "No evaluator registered for type: {}",
                    workflow_task.evaluator_type
                );
                return fmt_err!(
                    TerminateWorkflow,
                    "No evaluator registered for type: {}",
                    workflow_task.evaluator_type
                );
            }
        };

        let task_input = Object::Map(task_mapper_context.task_input.clone());
        let eval_result = evaluator
            .evaluate(&workflow_task.expression, &task_input)
            .map_err(|e| {
                let error_msg = format!(
                    "Error while evaluating script: {}, {}",
                    workflow_task.expression,
                    e.message()
                );
                error!("{}", error_msg);
                ErrorCode::TerminateWorkflow(error_msg)
            })?
            .to_string();
        debug!("eval_result is: {}", eval_result);

        let mut switch_task = task_mapper_context.create_task_model(TaskStatus::InProgress);
        switch_task.task_type = TaskType::Switch.as_ref().into();
        switch_task.task_def_name = TaskType::Switch.as_ref().into();
        switch_task.add_input("case", eval_result.clone());
        switch_task.add_output("evaluationResult", vec![Object::from(eval_result.clone())]);
        switch_task.start_time = Utc::now().timestamp_millis();

        schedule_selected_case(&task_mapper_context, switch_task, &eval_result)
    }
}

/// The case task followed by the first task of the selected case, or of the default case when
/// nothing matches. A case task with children carries `hasChildren` in its input.
pub(super) fn schedule_selected_case(
    task_mapper_context: &TaskMapperContext,
    case_task: TaskModel,
    case_value: &str,
) -> RegorResult<Vec<TaskModel>> {
    let workflow_task = task_mapper_context.workflow_task;
    let mut tasks_to_be_scheduled = vec![case_task];

    debug!("decision_cases is: {:?}", workflow_task.decision_cases.keys());
    let selected_tasks: &Vec<WorkflowTask> = match workflow_task.decision_cases.get(case_value) {
        Some(selected_tasks) if !selected_tasks.is_empty() => selected_tasks,
        // if the tasks returned are empty based on evaluated result, then get the default case
        _ => &workflow_task.default_case,
    };

    // once there are selected tasks that need to proceeded as part of the switch, get the next
    // task to be scheduled by using the decider service
    if let Some(selected_task) = selected_tasks.first() {
        let case_tasks = task_mapper_context
            .decider
            .get_tasks_to_be_scheduled_with_retry(
                task_mapper_context.workflow_model,
                selected_task,
                task_mapper_context.retry_count,
                &task_mapper_context.retry_task_id,
            )?;
        tasks_to_be_scheduled.extend(case_tasks);
        tasks_to_be_scheduled[0].add_input("hasChildren", "true");
    }

    Ok(tasks_to_be_scheduled)
}
