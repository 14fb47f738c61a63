use regor_common::prelude::*;
use regor_common::TaskType;

use super::decision_task_mapper::DecisionTaskMapper;
use super::do_while_task_mapper::DoWhileTaskMapper;
use super::dynamic_task_mapper::DynamicTaskMapper;
use super::event_task_mapper::EventTaskMapper;
use super::exclusive_join_task_mapper::ExclusiveJoinTaskMapper;
use super::fork_join_dynamic_task_mapper::ForkJoinDynamicTaskMapper;
use super::fork_join_task_mapper::ForkJoinTaskMapper;
use super::http_task_mapper::HttpTaskMapper;
use super::human_task_mapper::HumanTaskMapper;
use super::inline_task_mapper::InlineTaskMapper;
use super::join_task_mapper::JoinTaskMapper;
use super::lambda_task_mapper::LambdaTaskMapper;
use super::set_variable_task_mapper::SetVariableTaskMapper;
use super::simple_task_mapper::SimpleTaskMapper;
use super::start_workflow_task_mapper::StartWorkflowTaskMapper;
use super::sub_workflow_task_mapper::SubWorkflowTaskMapper;
use super::switch_task_mapper::SwitchTaskMapper;
use super::terminate_task_mapper::TerminateTaskMapper;
use super::user_defined_task_mapper::UserDefinedTaskMapper;
use super::wait_task_mapper::WaitTaskMapper;
use super::TaskMapper;

/// One `TaskMapper` per `TaskType`. A type without a mapper of its own is mapped as
/// `TaskType::UserDefined`.
pub struct TaskMapperRegistry {
    mappers: HashMap<TaskType, Box<dyn TaskMapper>>,
}

impl Default for TaskMapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskMapperRegistry {
    pub fn new() -> Self {
        let mappers: Vec<Box<dyn TaskMapper>> = vec![
            Box::new(SimpleTaskMapper),
            Box::new(UserDefinedTaskMapper),
            Box::new(DynamicTaskMapper),
            Box::new(DecisionTaskMapper),
            Box::new(SwitchTaskMapper),
            Box::new(ForkJoinTaskMapper),
            Box::new(ForkJoinDynamicTaskMapper),
            Box::new(JoinTaskMapper),
            Box::new(ExclusiveJoinTaskMapper),
            Box::new(DoWhileTaskMapper),
            Box::new(SubWorkflowTaskMapper),
            Box::new(StartWorkflowTaskMapper),
            Box::new(EventTaskMapper),
            Box::new(WaitTaskMapper),
            Box::new(HttpTaskMapper),
            Box::new(LambdaTaskMapper),
            Box::new(InlineTaskMapper),
            Box::new(HumanTaskMapper),
            Box::new(TerminateTaskMapper),
            Box::new(SetVariableTaskMapper),
        ];
        Self {
            mappers: mappers
                .into_iter()
                .map(|mapper| (mapper.get_task_type(), mapper))
                .collect(),
        }
    }

    pub fn get_task_mapper(&self, task_type: &str) -> RegorResult<&dyn TaskMapper> {
        self.mappers
            .get(&TaskType::of(task_type))
            .or_else(|| self.mappers.get(&TaskType::UserDefined))
            .map(|x| x.as_ref())
            .ok_or_else(|| {
                ErrorCode::IllegalArgument(format!("No task mapper found for type: {}", task_type))
            })
    }
}

#[cfg(test)]
mod tests {
    use regor_common::TaskType;

    use super::TaskMapperRegistry;

    #[test]
    fn unknown_types_map_as_user_defined() {
        let registry = TaskMapperRegistry::new();
        assert_eq!(
            registry.get_task_mapper("FORK_JOIN").unwrap().get_task_type(),
            TaskType::ForkJoin
        );
        assert_eq!(
            registry.get_task_mapper("encode_video").unwrap().get_task_type(),
            TaskType::UserDefined
        );
    }
}
