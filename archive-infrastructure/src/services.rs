pub mod json_rpc_client;

pub use json_rpc_client::*;
