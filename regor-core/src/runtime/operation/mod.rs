mod start_workflow_operation;

pub use start_workflow_operation::StartWorkflowOperation;
