//! HTTP transport surfaces for the Model Context Protocol
//!
//! Provides the event-stream endpoint, the message ingress endpoint, and
//! metadata endpoints.

pub mod handlers;
