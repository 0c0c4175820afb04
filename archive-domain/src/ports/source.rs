use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// JSON-RPC error code the node answers with once a cursor has run past the available data.
pub const NO_MORE_DATA_CODE: i64 = -32602;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The request never produced a JSON-RPC reply: connect/timeout failures or a non-2xx status.
    #[error("transport error (status {status:?}): {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// The reply was not a JSON-RPC envelope.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl CallError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    pub fn is_no_more_data(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == NO_MORE_DATA_CODE)
    }
}

/// Remote JSON-RPC endpoint.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError>;
}
