//! # relay-channels
//!
//! Messaging platform integrations for Relay.

pub mod whatsapp;

pub use whatsapp::WhatsAppCloudChannel;
