mod workflow_repair_service;
mod workflow_sweeper;

pub use workflow_repair_service::WorkflowRepairService;
pub use workflow_sweeper::WorkflowSweeper;
