use regor_common::prelude::*;

use crate::model::{TaskModel, WorkflowStatus};

/// Why and how a workflow has to be terminated, raised while deciding or executing it.
///
/// `ErrorCode::TerminateWorkflow` only carries the reason, a failed workflow is assumed. This
/// value travels with the decide outcome when the target status or the culprit task matters.
#[derive(Clone, Debug)]
pub struct TerminateWorkflowInfo {
    pub reason: InlineStr,
    pub status: WorkflowStatus,
    pub task: Option<TaskModel>,
}

impl TerminateWorkflowInfo {
    pub fn new(reason: impl Into<InlineStr>, status: WorkflowStatus, task: Option<TaskModel>) -> Self {
        Self {
            reason: reason.into(),
            status,
            task,
        }
    }

    pub fn from_error(error: &ErrorCode) -> Self {
        Self::new(error.display_text(), WorkflowStatus::Failed, None)
    }
}

/// The failure of a decide step: either the workflow has to be terminated, or the step itself
/// failed and nothing was decided.
#[derive(Debug)]
pub(crate) enum DecideError {
    Terminate(TerminateWorkflowInfo),
    Error(ErrorCode),
}

impl From<ErrorCode> for DecideError {
    fn from(error: ErrorCode) -> Self {
        if error.is_terminate_workflow() {
            DecideError::Terminate(TerminateWorkflowInfo::from_error(&error))
        } else {
            DecideError::Error(error)
        }
    }
}

impl From<TerminateWorkflowInfo> for DecideError {
    fn from(info: TerminateWorkflowInfo) -> Self {
        DecideError::Terminate(info)
    }
}
