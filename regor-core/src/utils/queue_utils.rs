use regor_common::prelude::*;

use crate::model::TaskModel;

/// Queue naming: `[domain:]TASK_TYPE[@namespace][-isolation]`.
pub struct QueueUtils;

impl QueueUtils {
    pub const DOMAIN_SEPARATOR: &'static str = ":";
    pub const ISOLATION_SEPARATOR: &'static str = "-";
    pub const EXECUTION_NAME_SPACE_SEPARATOR: &'static str = "@";

    pub fn get_queue_name_by_task_model(task_model: &TaskModel) -> InlineStr {
        Self::get_queue_name(
            &task_model.task_type,
            &task_model.domain,
            &task_model.isolation_group_id,
            &task_model.execution_name_space,
        )
    }

    pub fn get_queue_name(
        task_type: &str,
        domain: &str,
        isolation_group_id: &str,
        execution_name_space: &str,
    ) -> InlineStr {
        let mut queue_name = InlineStr::new();
        if !domain.is_empty() {
            queue_name.push_str(domain);
            queue_name.push_str(Self::DOMAIN_SEPARATOR);
        }
        queue_name.push_str(task_type);

        if !execution_name_space.is_empty() {
            queue_name.push_str(Self::EXECUTION_NAME_SPACE_SEPARATOR);
            queue_name.push_str(execution_name_space);
        }

        if !isolation_group_id.is_empty() {
            queue_name.push_str(Self::ISOLATION_SEPARATOR);
            queue_name.push_str(isolation_group_id);
        }

        queue_name
    }

    pub fn get_task_type(queue: &str) -> &str {
        if queue.is_empty() {
            return queue;
        }

        let start_index = queue
            .find(Self::DOMAIN_SEPARATOR)
            .map(|index| index + 1)
            .unwrap_or(0);
        let rest = &queue[start_index..];

        let end_index = rest
            .find(Self::EXECUTION_NAME_SPACE_SEPARATOR)
            .or_else(|| rest.rfind(Self::ISOLATION_SEPARATOR))
            .unwrap_or(rest.len());

        &rest[..end_index]
    }

    pub fn is_isolated_queue(queue: &str) -> bool {
        !Self::get_isolation_group(queue).is_empty()
    }

    fn get_isolation_group(queue: &str) -> &str {
        match queue.rfind(Self::ISOLATION_SEPARATOR) {
            Some(index) => &queue[index + 1..],
            None => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QueueUtils;

    #[test]
    fn queue_name_round_trip() {
        let name = QueueUtils::get_queue_name("HTTP", "us", "iso1", "ns");
        assert_eq!(name, "us:HTTP@ns-iso1");
        assert_eq!(QueueUtils::get_task_type(&name), "HTTP");
        assert!(QueueUtils::is_isolated_queue(&name));

        assert_eq!(QueueUtils::get_queue_name("JOIN", "", "", ""), "JOIN");
        assert_eq!(QueueUtils::get_task_type("JOIN"), "JOIN");
        assert_eq!(QueueUtils::get_task_type("EVENT-g2"), "EVENT");
        assert!(!QueueUtils::is_isolated_queue("WAIT"));
    }
}
