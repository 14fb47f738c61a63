use crate::metadata::JsonExt;
use crate::prelude::*;
use crate::TaskType;

/// One branch of a FORK_JOIN_DYNAMIC given through `dynamicForkJoinTasksParam`.
#[derive(Clone, Debug)]
pub struct DynamicForkJoinTask {
    pub task_name: InlineStr,
    pub workflow_name: InlineStr,
    pub reference_name: InlineStr,
    pub input: HashMap<InlineStr, Object>,
    pub type_: InlineStr,
}

#[derive(Clone, Debug, Default)]
pub struct DynamicForkJoinTaskList {
    pub dynamic_tasks: Vec<DynamicForkJoinTask>,
}

impl TryFrom<&serde_json::Value> for DynamicForkJoinTask {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        Ok(Self {
            task_name: value.required_str("taskName")?,
            workflow_name: value.str_or("workflowName", "")?,
            reference_name: value.required_str("referenceName")?,
            input: value.object_map("input")?,
            type_: value.str_or("type", TaskType::Simple.as_ref())?,
        })
    }
}

impl TryFrom<&Object> for DynamicForkJoinTaskList {
    type Error = ErrorCode;
    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        let json = value.to_json();
        let list = json
            .field("dynamicTasks")
            .and_then(|x| x.as_array())
            .ok_or(ErrorCode::IllegalArgument("dynamicTasks not found or not array"))?;
        let mut dynamic_tasks = Vec::with_capacity(list.len());
        for item in list {
            dynamic_tasks.push(DynamicForkJoinTask::try_from(item)?);
        }
        Ok(Self { dynamic_tasks })
    }
}
