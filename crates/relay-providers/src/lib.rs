//! # relay-providers
//!
//! Chat-completion provider implementations for Relay.

pub mod openai;

pub use openai::OpenAiProvider;
