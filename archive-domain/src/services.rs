// Domain Services
// Pure logic shared by the ingestion engine and the sinks

pub mod flatten;
pub mod schema_registry;
pub mod window;

pub use flatten::*;
pub use schema_registry::*;
pub use window::*;
