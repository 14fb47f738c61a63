use chrono::Utc;
use regor_common::prelude::*;
use regor_common::{DynamicForkJoinTaskList, TaskType, WorkflowTask};

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::utils::IdGenerator;

type DynamicForkTasksAndInput = (Vec<WorkflowTask>, HashMap<InlineStr, Object>);

/// An implementation of `TaskMapper` to map a `WorkflowTask` of type `TaskType::ForkJoinDynamic`
/// to a List of `TaskModel` beginning with a `TaskType::Fork`, followed by the user defined
/// dynamic tasks and a `TaskType::Join` at the end
pub struct ForkJoinDynamicTaskMapper;

impl TaskMapper for ForkJoinDynamicTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::ForkJoinDynamic
    }

    /// The branches come either from `dynamicForkTasksParam`, a list of workflow tasks with
    /// their inputs keyed by reference name under `dynamicForkTasksInputParamName`, or from
    /// `dynamicForkJoinTasksParam`, a `DynamicForkJoinTaskList`.
    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in ForkJoinDynamicTaskMapper",
            task_mapper_context
        );

        let workflow_task = task_mapper_context.workflow_task;
        let workflow_model = task_mapper_context.workflow_model;
        let retry_count = task_mapper_context.retry_count;

        let (dyn_fork_tasks, tasks_input) = if !workflow_task.dynamic_fork_tasks_param.is_empty() {
            Self::get_dynamic_fork_tasks_and_input(&task_mapper_context)?
        } else {
            Self::get_dynamic_fork_join_tasks_and_input(&task_mapper_context)?
        };

        let mut mapped_tasks = vec![Self::create_dynamic_fork_task(
            &task_mapper_context,
            &dyn_fork_tasks,
        )?];

        let mut join_on_task_refs = Vec::with_capacity(dyn_fork_tasks.len());
        for dyn_fork_task in &dyn_fork_tasks {
            let mut forked_tasks = task_mapper_context.decider.get_tasks_to_be_scheduled(
                workflow_model,
                dyn_fork_task,
                retry_count,
            )?;

            if forked_tasks.is_empty() {
                let mut terminate_message = format!(
                    "No dynamic tasks could be created for the Workflow: {}, Dynamic Fork Task: {}",
                    workflow_model.to_short_string(),
                    dyn_fork_task.task_reference_name
                );
                let existing = workflow_model.tasks.iter().any(|x| {
                    (x.status == TaskStatus::InProgress || x.status.is_terminal())
                        && x.reference_task_name == dyn_fork_task.task_reference_name
                });
                if existing {
                    terminate_message.push_str(&format!(
                        ". Attempted to create a duplicate task reference name: {}",
                        dyn_fork_task.task_reference_name
                    ));
                }
                return str_err!(TerminateWorkflow, terminate_message);
            }

            for forked_task in forked_tasks.iter_mut() {
                if let Some(Object::Map(forked_task_input)) =
                    tasks_input.get(&forked_task.reference_task_name)
                {
                    forked_task
                        .input_data
                        .extend(forked_task_input.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }

            if let Some(last) = forked_tasks.last() {
                join_on_task_refs.push(Object::from(&last.reference_task_name));
            }
            mapped_tasks.extend(forked_tasks);
        }

        let join_workflow_task = match workflow_model
            .workflow_definition
            .get_next_task(&workflow_task.task_reference_name)
        {
            Some(join) if join.task_type() == TaskType::Join => join,
            _ => {
                return str_err!(
                    TerminateWorkflow,
                    "Dynamic join definition is not followed by a join task. Check the workflow definition."
                )
            }
        };

        let join_input = object_map! { "joinOn" => join_on_task_refs };
        mapped_tasks.push(Self::create_join_task(
            workflow_model,
            join_workflow_task,
            join_input,
        ));
        Ok(mapped_tasks)
    }
}

impl ForkJoinDynamicTaskMapper {
    fn create_dynamic_fork_task(
        task_mapper_context: &TaskMapperContext,
        dyn_fork_tasks: &[WorkflowTask],
    ) -> RegorResult<TaskModel> {
        let mut fork_dynamic_task = task_mapper_context.create_task_model(TaskStatus::Completed);
        fork_dynamic_task.task_type = TaskType::Fork.as_ref().into();
        fork_dynamic_task.task_def_name = TaskType::Fork.as_ref().into();
        let epoch_millis = Utc::now().timestamp_millis();
        fork_dynamic_task.start_time = epoch_millis;
        fork_dynamic_task.end_time = epoch_millis;

        let forked_task_names = dyn_fork_tasks
            .iter()
            .map(|x| Object::from(&x.task_reference_name))
            .collect::<Vec<_>>();
        let mut forked_task_defs = Vec::with_capacity(dyn_fork_tasks.len());
        for dyn_fork_task in dyn_fork_tasks {
            forked_task_defs.push(Object::from_json(&dyn_fork_task.to_json()?));
        }
        fork_dynamic_task.add_input("forkedTasks", forked_task_names);
        fork_dynamic_task.add_input("forkedTaskDefs", forked_task_defs);
        Ok(fork_dynamic_task)
    }

    fn create_join_task(
        workflow_model: &WorkflowModel,
        join_workflow_task: &WorkflowTask,
        join_input: HashMap<InlineStr, Object>,
    ) -> TaskModel {
        let now = Utc::now().timestamp_millis();
        let mut join_task = TaskModel::new(TaskStatus::InProgress);
        join_task.task_type = TaskType::Join.as_ref().into();
        join_task.task_def_name = TaskType::Join.as_ref().into();
        join_task.reference_task_name = join_workflow_task.task_reference_name.clone();
        join_task.workflow_instance_id = workflow_model.workflow_id.clone();
        join_task.workflow_type = workflow_model.workflow_definition.name.clone();
        join_task.correlation_id = workflow_model.correlation_id.clone();
        join_task.scheduled_time = now;
        join_task.start_time = now;
        join_task.input_data = join_input;
        join_task.task_id = IdGenerator::generate();
        join_task.workflow_task = Some(join_workflow_task.clone());
        join_task.workflow_priority = workflow_model.priority;
        join_task
    }

    /// A dynamic fork needs at least one branch for its join to wait on.
    fn ensure_branches(param: &str, branches: &[WorkflowTask]) -> RegorResult<()> {
        if branches.is_empty() {
            let reason = format!("Dynamic fork {} has no tasks to be scheduled", param);
            error!("{}", reason);
            return Err(ErrorCode::TerminateWorkflow(reason));
        }
        Ok(())
    }

    /// Fills the definition of the forked tasks that do not embed one.
    fn populate_task_definitions(
        task_mapper_context: &TaskMapperContext,
        workflow_tasks: &mut [WorkflowTask],
    ) -> RegorResult<()> {
        for workflow_task in workflow_tasks {
            if workflow_task.task_definition.is_none() && !workflow_task.name.trim().is_empty() {
                workflow_task.task_definition =
                    task_mapper_context.decider.get_task_def(&workflow_task.name)?;
            }
        }
        Ok(())
    }

    fn get_dynamic_fork_tasks_and_input(
        task_mapper_context: &TaskMapperContext,
    ) -> RegorResult<DynamicForkTasksAndInput> {
        let workflow_task = task_mapper_context.workflow_task;
        let input = &task_mapper_context.task_input;

        let mut dynamic_fork_workflow_tasks = match input.get(&workflow_task.dynamic_fork_tasks_param)
        {
            Some(Object::List(list)) => {
                let jsonlist = list.iter().map(|x| x.to_json()).collect::<Vec<_>>();
                WorkflowTask::try_from_jsonlist(&jsonlist).map_err(|e| {
                    ErrorCode::TerminateWorkflow(format!(
                        "Dynamic fork tasks of {} are not valid workflow tasks: {}",
                        workflow_task.dynamic_fork_tasks_param,
                        e.message()
                    ))
                })?
            }
            other => {
                return fmt_err!(
                    TerminateWorkflow,
                    "Dynamic fork tasks of {} must be a list of workflow tasks, found {:?}",
                    workflow_task.dynamic_fork_tasks_param,
                    other
                )
            }
        };
        Self::ensure_branches(&workflow_task.dynamic_fork_tasks_param, &dynamic_fork_workflow_tasks)?;
        Self::populate_task_definitions(task_mapper_context, &mut dynamic_fork_workflow_tasks)?;

        match input.get(&workflow_task.dynamic_fork_tasks_input_param_name) {
            Some(Object::Map(dynamic_fork_tasks_input)) => {
                Ok((dynamic_fork_workflow_tasks, dynamic_fork_tasks_input.clone()))
            }
            other => fmt_err!(
                TerminateWorkflow,
                "Input to the dynamically forked tasks is not a map -> expecting a map of K,V  but found {:?}",
                other
            ),
        }
    }

    fn get_dynamic_fork_join_tasks_and_input(
        task_mapper_context: &TaskMapperContext,
    ) -> RegorResult<DynamicForkTasksAndInput> {
        let dynamic_fork_join_task_param =
            &task_mapper_context.workflow_task.dynamic_fork_join_tasks_param;
        let input = &task_mapper_context.task_input;

        let dynamic_fork_join_task_list = input
            .get(dynamic_fork_join_task_param)
            .and_then(|x| DynamicForkJoinTaskList::try_from(x).ok())
            .ok_or_else(|| {
                let reason = format!(
                    "Dynamic tasks could not be created. The value of {} from task's input {:?} has no dynamic tasks to be scheduled",
                    dynamic_fork_join_task_param, input
                );
                error!("{}", reason);
                ErrorCode::TerminateWorkflow(reason)
            })?;

        let mut dynamic_fork_join_tasks_input = HashMap::new();
        let mut dynamic_fork_join_workflow_tasks =
            Vec::with_capacity(dynamic_fork_join_task_list.dynamic_tasks.len());
        for dynamic_fork_join_task in dynamic_fork_join_task_list.dynamic_tasks {
            let mut workflow_task = WorkflowTask::new(
                &dynamic_fork_join_task.task_name,
                &dynamic_fork_join_task.reference_name,
                TaskType::Simple,
            );
            workflow_task.type_ = dynamic_fork_join_task.type_;
            dynamic_fork_join_tasks_input.insert(
                dynamic_fork_join_task.reference_name,
                Object::Map(dynamic_fork_join_task.input),
            );
            dynamic_fork_join_workflow_tasks.push(workflow_task);
        }
        Self::ensure_branches(dynamic_fork_join_task_param, &dynamic_fork_join_workflow_tasks)?;
        Self::populate_task_definitions(task_mapper_context, &mut dynamic_fork_join_workflow_tasks)?;

        Ok((dynamic_fork_join_workflow_tasks, dynamic_fork_join_tasks_input))
    }
}
