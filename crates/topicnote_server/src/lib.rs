//! Request dispatcher and TCP front end for the topicnote service.
//!
//! # Responsibility
//! - Map JSON-RPC calls onto `topicnote_core::NoteService` operations.
//! - Serve concurrent clients, one worker thread per connection.
//!
//! # Invariants
//! - No document state lives here; exclusion is owned by the document store.
//! - Per-connection faults become error responses and never stop the server.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod protocol;
pub mod server;

pub use client::{ClientError, RpcClient};
pub use config::{ConfigError, ServerConfig};
pub use dispatcher::{Dispatcher, Reply};
pub use protocol::{error_codes, JsonRpcId, JsonRpcRequest, JsonRpcResponse, WireNote};
pub use server::NoteServer;
