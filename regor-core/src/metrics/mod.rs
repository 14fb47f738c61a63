mod monitors;

pub use monitors::Monitors;
