//! Shared types for ModelRelay: configuration, model descriptors, messages,
//! stream events and the error type every crate returns.

pub mod config;
pub mod error;
pub mod message;
pub mod models;
pub mod stream;
