use numtoa::NumToA;

use crate::prelude::InlineStr;

pub struct TaskUtils;

impl TaskUtils {
    pub const LOOP_TASK_DELIMITER: &'static str = "__";

    /// `ref` becomes `ref__2` for the second iteration of a loop body.
    pub fn append_iteration(name: &mut InlineStr, iteration: i32) {
        name.push_str(Self::LOOP_TASK_DELIMITER);
        name.push_str(iteration.numtoa_str(10, &mut [0; 16]))
    }

    pub fn get_loop_over_task_ref_name(name: &str, iteration: i32) -> InlineStr {
        let mut name = InlineStr::from(name);
        Self::append_iteration(&mut name, iteration);
        name
    }

    pub fn remove_iteration_from_task_ref_name(reference_task_name: &str) -> &str {
        match reference_task_name.rfind(Self::LOOP_TASK_DELIMITER) {
            Some(pos)
                if reference_task_name[pos + Self::LOOP_TASK_DELIMITER.len()..]
                    .chars()
                    .all(|c| c.is_ascii_digit())
                    && pos + Self::LOOP_TASK_DELIMITER.len() < reference_task_name.len() =>
            {
                &reference_task_name[..pos]
            }
            _ => reference_task_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_suffix() {
        assert_eq!(TaskUtils::get_loop_over_task_ref_name("step", 3), "step__3");
        assert_eq!(TaskUtils::remove_iteration_from_task_ref_name("step__3"), "step");
        assert_eq!(TaskUtils::remove_iteration_from_task_ref_name("step"), "step");
        assert_eq!(TaskUtils::remove_iteration_from_task_ref_name("my__step"), "my__step");
    }
}
