mod env_utils;
mod task_utils;

pub use env_utils::EnvUtils;
pub use task_utils::TaskUtils;
