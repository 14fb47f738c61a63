use linked_hash_map::LinkedHashMap;
use regor_common::prelude::*;
use regor_common::{TaskType, TaskUtils, WorkflowTask};

use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::evaluators::{EvaluatorRegistry, JavascriptEvaluator};
use crate::runtime::execution::WorkflowExecutor;
use crate::utils::ParametersUtils;

/// Runs the `loopOver` tasks until `loopCondition` evaluates to false.
///
/// The body tasks of iteration `n` carry the reference name suffix `__n`, the DO_WHILE task keeps
/// the output of every iteration under the key `"n"`.
pub struct DoWhile {
    evaluators: Arc<EvaluatorRegistry>,
}

impl DoWhile {
    pub fn new(evaluators: Arc<EvaluatorRegistry>) -> Self {
        Self { evaluators }
    }

    /// The body tasks of the current iteration by reference name. Among several instances the
    /// highest retry count wins, then the latest scheduled.
    fn relevant_tasks(
        do_while_task: &TaskModel,
        do_while_workflow_task: &WorkflowTask,
        workflow: &WorkflowModel,
    ) -> LinkedHashMap<InlineStr, TaskModel> {
        let mut relevant_tasks: LinkedHashMap<InlineStr, TaskModel> = LinkedHashMap::new();
        for task in &workflow.tasks {
            if task.reference_task_name == do_while_task.reference_task_name
                || task.iteration != do_while_task.iteration
                || !do_while_workflow_task.has(task.ref_name_without_iteration())
            {
                continue;
            }
            let replace = match relevant_tasks.get(&task.reference_task_name) {
                Some(current) => {
                    (task.retry_count, task.scheduled_time)
                        >= (current.retry_count, current.scheduled_time)
                }
                None => true,
            };
            if replace {
                relevant_tasks.insert(task.reference_task_name.clone(), task.clone());
            }
        }
        relevant_tasks
    }

    fn is_iteration_complete(
        do_while_task: &TaskModel,
        do_while_workflow_task: &WorkflowTask,
        relevant_tasks: &LinkedHashMap<InlineStr, TaskModel>,
    ) -> bool {
        let loop_tasks_terminal = do_while_workflow_task.loop_over.iter().all(|loop_task| {
            let ref_name = TaskUtils::get_loop_over_task_ref_name(
                &loop_task.task_reference_name,
                do_while_task.iteration,
            );
            relevant_tasks
                .get(&ref_name)
                .map(|x| x.status.is_terminal())
                .unwrap_or(false)
        });
        loop_tasks_terminal && relevant_tasks.values().all(|x| x.status.is_terminal())
    }

    fn evaluate_condition(
        &self,
        workflow: &WorkflowModel,
        do_while_task: &TaskModel,
        do_while_workflow_task: &WorkflowTask,
        relevant_tasks: &LinkedHashMap<InlineStr, TaskModel>,
    ) -> RegorResult<bool> {
        let mut condition_input = ParametersUtils::get_task_input(
            &do_while_workflow_task.input_parameters,
            workflow,
            do_while_task.get_task_definition(),
            Some(&do_while_task.task_id),
        )?;
        condition_input.insert(
            do_while_task.reference_task_name.clone(),
            do_while_task.output_data.clone().into(),
        );
        for task in relevant_tasks.values() {
            condition_input.insert(
                task.ref_name_without_iteration().into(),
                task.output_data.clone().into(),
            );
        }

        let evaluator_type = if do_while_workflow_task.evaluator_type.is_empty() {
            JavascriptEvaluator::NAME
        } else {
            do_while_workflow_task.evaluator_type.as_str()
        };
        let evaluator = self.evaluators.get_evaluator(evaluator_type).ok_or_else(|| {
            ErrorCode::ScriptEvalFailed(format!("evaluator {} not found", evaluator_type))
        })?;

        let result = evaluator.evaluate(
            &do_while_workflow_task.loop_condition,
            &Object::Map(condition_input),
        )?;
        debug!(
            "Task {} condition evaluated to {:?}",
            do_while_task.task_id, result
        );
        match result {
            Object::Boolean(x) => Ok(x),
            Object::Null => Ok(false),
            other => fmt_err!(
                ScriptEvalFailed,
                "loopCondition of {} evaluated to a non boolean value: {:?}",
                do_while_task.reference_task_name,
                other
            ),
        }
    }

    fn schedule_next_iteration(
        task: &mut TaskModel,
        workflow: &mut WorkflowModel,
        executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        debug!(
            "Scheduling loop tasks for task {} as condition {:?} evaluated to true",
            task.task_id,
            task.workflow_task.as_ref().map(|x| &x.loop_condition)
        );
        executor.schedule_next_iteration(task, workflow)?;
        Ok(true)
    }
}

impl WorkflowSystemTask for DoWhile {
    fn task_type(&self) -> &str {
        TaskType::DoWhile.as_ref()
    }

    fn execute(
        &self,
        workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        let do_while_workflow_task = match &task.workflow_task {
            Some(workflow_task) => workflow_task.clone(),
            None => {
                task.set_failed(
                    TaskStatus::FailedWithTerminalError,
                    "DO_WHILE task without workflow task definition",
                );
                return Ok(true);
            }
        };

        let relevant_tasks = Self::relevant_tasks(task, &do_while_workflow_task, workflow);
        if relevant_tasks.is_empty() {
            task.iteration = 1;
            task.add_output("iteration", task.iteration);
            return Self::schedule_next_iteration(task, workflow, executor);
        }

        let mut failure_reason = String::new();
        let mut has_failures = false;
        let mut output = HashMap::new();
        for loop_task in relevant_tasks.values() {
            let task_status = loop_task.status;
            if task_status.is_terminal() && !task_status.is_successful() {
                has_failures = true;
                failure_reason.push_str(&loop_task.reason_for_incompletion);
                failure_reason.push(' ');
            }
            output.insert(
                InlineStr::from(loop_task.ref_name_without_iteration()),
                Object::from(loop_task.output_data.clone()),
            );
            if has_failures {
                break;
            }
        }
        let iteration_key = task.iteration.to_string();
        task.add_output(&iteration_key, output);

        if has_failures {
            debug!(
                "Task {} failed in {} iteration",
                task.task_id, task.iteration
            );
            task.set_failed(TaskStatus::Failed, failure_reason.trim_end());
            return Ok(true);
        }

        if !Self::is_iteration_complete(task, &do_while_workflow_task, &relevant_tasks) {
            return Ok(false);
        }

        match self.evaluate_condition(workflow, task, &do_while_workflow_task, &relevant_tasks) {
            Ok(true) => {
                task.iteration += 1;
                task.add_output("iteration", task.iteration);
                Self::schedule_next_iteration(task, workflow, executor)
            }
            Ok(false) => {
                debug!(
                    "Task {} took {} iterations to complete",
                    task.task_id, task.iteration
                );
                task.set_status(TaskStatus::Completed);
                Ok(true)
            }
            Err(e) => {
                let message = format!(
                    "Unable to evaluate condition {}, exception {}",
                    do_while_workflow_task.loop_condition,
                    e.display_text()
                );
                error!("{}", message);
                task.set_failed(TaskStatus::FailedWithTerminalError, message);
                Ok(true)
            }
        }
    }
}
