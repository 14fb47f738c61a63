use regor_common::prelude::*;
use regor_common::ActionType;
use strum_macros::{AsRefStr, EnumString};

/// The record of one handler action run for one event queue message.
///
/// The id is `{messageId}_{actionIndex}`, so a redelivered message maps onto the same records.
#[derive(Clone, Debug)]
pub struct EventExecution {
    pub id: InlineStr,
    pub message_id: InlineStr,
    /// The event handler name.
    pub name: InlineStr,
    pub event: InlineStr,
    pub created: i64,
    pub status: EventExecutionStatus,
    pub action: Option<ActionType>,
    pub output: HashMap<InlineStr, Object>,
}

impl EventExecution {
    pub fn new(id: impl Into<InlineStr>, message_id: &str) -> Self {
        Self {
            id: id.into(),
            message_id: message_id.into(),
            name: InlineStr::new(),
            event: InlineStr::new(),
            created: 0,
            status: EventExecutionStatus::InProgress,
            action: None,
            output: HashMap::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, EnumString, AsRefStr, PartialEq, Eq, Hash)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventExecutionStatus {
    InProgress,
    Completed,
    Failed,
    Skipped,
}
