//! # relay-memory
//!
//! Persistent memory for Relay (SQLite-backed): conversation history,
//! customer registry, broadcast ledger, and audit log.

pub mod audit;
pub mod store;

pub use audit::AuditLogger;
pub use store::Store;
