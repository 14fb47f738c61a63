use std::collections::HashSet;
use std::str::FromStr;

use once_cell::sync::Lazy;
use strum_macros::{AsRefStr, EnumString};

/// The closed set of workflow task types. `Fork` only ever appears on task instances, it is the
/// synthetic task a FORK_JOIN or FORK_JOIN_DYNAMIC node schedules before its branches.
#[derive(Clone, Copy, Debug, EnumString, AsRefStr, PartialEq, Eq, Hash)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Simple,
    Dynamic,
    ForkJoin,
    ForkJoinDynamic,
    Decision,
    Switch,
    Join,
    DoWhile,
    SubWorkflow,
    StartWorkflow,
    Event,
    Wait,
    Human,
    UserDefined,
    Http,
    Lambda,
    Inline,
    ExclusiveJoin,
    Terminate,
    SetVariable,
    Fork,
}

static BUILT_IN_TASKS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from_iter([
        TaskType::Decision.as_ref(),
        TaskType::Switch.as_ref(),
        TaskType::Fork.as_ref(),
        TaskType::Join.as_ref(),
        TaskType::ExclusiveJoin.as_ref(),
        TaskType::DoWhile.as_ref(),
    ])
});

impl TaskType {
    /// Converts a task type string to `TaskType`. For an unknown string, the value is defaulted to
    /// `TaskType::UserDefined`.
    pub fn of(task_type: &str) -> TaskType {
        TaskType::from_str(task_type).unwrap_or(TaskType::UserDefined)
    }

    /// Control-flow types whose outcome is decided by the engine itself and never retried.
    pub fn is_builtin(task_type: &str) -> bool {
        BUILT_IN_TASKS.contains(task_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_type_names() {
        assert_eq!(TaskType::of("FORK_JOIN_DYNAMIC"), TaskType::ForkJoinDynamic);
        assert_eq!(TaskType::of("my_worker_task"), TaskType::UserDefined);
        assert_eq!(TaskType::SetVariable.as_ref(), "SET_VARIABLE");
        assert!(TaskType::is_builtin("JOIN"));
        assert!(!TaskType::is_builtin("SIMPLE"));
    }
}
