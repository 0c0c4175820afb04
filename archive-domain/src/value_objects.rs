// Domain value objects
pub mod event_id;
pub mod event_kind;
pub mod event_query;
pub mod time_range;

pub use event_id::*;
pub use event_kind::*;
pub use event_query::*;
pub use time_range::*;
