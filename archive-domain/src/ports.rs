// Port Traits (Interfaces)
// Define what the ingestion engine needs from infrastructure

pub mod sinks;
pub mod source;

pub use sinks::*;
pub use source::*;
