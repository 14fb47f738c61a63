use std::env;

use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};

use crate::prelude::*;

/// Resolves `${NAME}` references in task inputs that point at system parameters or environment
/// variables rather than at workflow data.
pub struct EnvUtils;

impl EnvUtils {
    pub fn is_environment_variable(test: &str) -> bool {
        SystemParameters::iter().any(|c| c.as_ref().eq(test)) || env::var_os(test).is_some()
    }

    pub fn get_system_parameters_value(sys_param: &str, task_id: Option<&str>) -> Option<InlineStr> {
        if SystemParameters::RegorTaskId.as_ref().eq(sys_param) {
            task_id.map(InlineStr::from)
        } else {
            env::var(sys_param).ok().map(InlineStr::from)
        }
    }
}

#[derive(Clone, Copy, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
enum SystemParameters {
    RegorTaskId,
    RegorEnv,
    RegorStack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_parameter() {
        assert!(EnvUtils::is_environment_variable("REGOR_TASK_ID"));
        assert_eq!(
            EnvUtils::get_system_parameters_value("REGOR_TASK_ID", Some("t1")),
            Some(InlineStr::from("t1"))
        );
        assert!(!EnvUtils::is_environment_variable("REGOR_SURELY_NOT_SET_ANYWHERE"));
    }
}
