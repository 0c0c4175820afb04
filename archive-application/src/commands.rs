pub mod archive_commands;

pub use archive_commands::*;
