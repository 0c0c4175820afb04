// Archive Application Layer

pub mod commands;
pub mod error;
pub mod metrics;
pub mod plan;
pub mod polling;
pub mod retry;
pub mod router;
pub mod state;

#[cfg(test)]
mod testing;

pub use error::ArchiveError;
pub use metrics::Metrics;
pub use router::{Saved, SinkRouter};
pub use state::ArchiveState;
