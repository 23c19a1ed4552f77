//! Model Context Protocol (MCP) request handling
//!
//! JSON-RPC envelope formatting lives in `rpc`; method routing and the fixed
//! protocol handlers live in `server`.

pub mod rpc;
pub mod server;

pub use server::Dispatcher;
