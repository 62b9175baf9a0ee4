// SecureDB: Gateway Module
//
// Unix Domain Socket server exposing the record store to local processes
// over newline-delimited JSON-RPC 2.0.

mod protocol;
mod uds;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use uds::UdsServer;
