pub mod context;
pub mod lifecycle;

pub use context::ArchiveContext;
pub use lifecycle::{describe_plan, run, shutdown_signal};
