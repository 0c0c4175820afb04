use archive_domain::{DecodeError, WindowCovered};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    WindowCovered(#[from] WindowCovered),
    #[error(transparent)]
    Sink(#[from] anyhow::Error),
}
