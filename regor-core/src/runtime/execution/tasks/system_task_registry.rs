use regor_common::prelude::*;

use super::{
    Decision, DoWhile, Event, ExclusiveJoin, Fork, Human, Inline, Join, Lambda, SetVariable,
    StartWorkflow, SubWorkflow, Switch, Terminate, Wait, WorkflowSystemTask,
};
use crate::config::Properties;
use crate::external::EventQueues;
use crate::runtime::execution::evaluators::EvaluatorRegistry;

/// Holds a mapping of system task types to `WorkflowSystemTask` instances.
pub struct SystemTaskRegistry {
    tasks: HashMap<InlineStr, Arc<dyn WorkflowSystemTask>>,
}

impl SystemTaskRegistry {
    pub fn new(
        evaluators: Arc<EvaluatorRegistry>,
        event_queues: Option<Arc<dyn EventQueues>>,
        properties: Arc<Properties>,
    ) -> Self {
        let tasks: Vec<Arc<dyn WorkflowSystemTask>> = vec![
            Arc::new(Decision),
            Arc::new(Switch),
            Arc::new(Fork),
            Arc::new(Join),
            Arc::new(ExclusiveJoin),
            Arc::new(DoWhile::new(evaluators.clone())),
            Arc::new(SubWorkflow),
            Arc::new(StartWorkflow),
            Arc::new(Event::new(event_queues)),
            Arc::new(Wait),
            Arc::new(Human),
            Arc::new(Lambda::new(evaluators.clone())),
            Arc::new(Inline::new(evaluators)),
            Arc::new(SetVariable::new(
                properties.max_workflow_variables_payload_size_threshold_kb,
            )),
            Arc::new(Terminate),
        ];

        Self {
            tasks: tasks
                .into_iter()
                .map(|task| (InlineStr::from(task.task_type()), task))
                .collect(),
        }
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn WorkflowSystemTask>> {
        self.tasks.get(task_type).cloned()
    }

    pub fn is_system_task(&self, task_type: &str) -> bool {
        self.tasks.contains_key(task_type)
    }

    /// The tasks driven through their own queue by the system task worker.
    pub fn async_system_tasks(&self) -> Vec<Arc<dyn WorkflowSystemTask>> {
        self.tasks
            .values()
            .filter(|task| task.is_async())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use regor_common::prelude::*;
    use regor_common::TaskType;

    use super::SystemTaskRegistry;
    use crate::config::Properties;
    use crate::runtime::execution::evaluators::EvaluatorRegistry;

    #[test]
    fn registers_builtin_system_tasks() {
        let registry = SystemTaskRegistry::new(
            Arc::new(EvaluatorRegistry::new()),
            None,
            Arc::new(Properties::default()),
        );

        assert!(registry.is_system_task(TaskType::Join.as_ref()));
        assert!(registry.is_system_task(TaskType::DoWhile.as_ref()));
        assert!(!registry.is_system_task(TaskType::Simple.as_ref()));
        assert!(!registry.is_system_task(TaskType::Http.as_ref()));

        let mut async_tasks = registry
            .async_system_tasks()
            .iter()
            .map(|x| x.task_type().to_owned())
            .collect::<Vec<_>>();
        async_tasks.sort();
        assert_eq!(
            async_tasks,
            vec!["EVENT", "EXCLUSIVE_JOIN", "JOIN", "START_WORKFLOW", "SUB_WORKFLOW"]
        );
    }
}
