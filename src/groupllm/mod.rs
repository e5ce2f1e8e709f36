// src/groupllm/mod.rs

pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod context;
pub mod continuation;
pub mod error;
pub mod event;
pub mod fairness;
pub mod fragment;
pub mod group_chat;
pub mod invoker;
pub mod profile;
pub mod round;
pub mod sanitize;
pub mod scheduler;
pub mod session;
pub mod sink;

// Export the façade so it is reachable as groupllm::GroupChat rather than
// groupllm::group_chat::GroupChat
pub use group_chat::{GroupChat, TurnOutcome};
