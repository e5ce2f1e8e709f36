//! [`ClientWrapper`](crate::client_wrapper::ClientWrapper) implementations.
//!
//! Agents and the coordinator each carry their own backend settings, so the bundled
//! client resolves endpoint, key and model per request and shares pooled HTTP
//! connections per base URL.

pub mod common;
pub mod http_pool;
pub mod openai;
