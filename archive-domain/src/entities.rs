// Domain entities

pub mod columns;
pub mod event;
pub mod page;

pub use columns::*;
pub use event::*;
pub use page::*;
