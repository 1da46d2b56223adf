//! # Node Runtime Library
//!
//! Hosts the federation coordinator. The binary in `main.rs` loads
//! [`NodeConfig`] from the environment, builds a [`FederationContainer`] and
//! runs the event listener until Ctrl+C.
//!
//! ## Modules
//!
//! - `container/` - Configuration and subsystem wiring
//! - `handlers/` - Event bus subscribers
//! - `storage` - Data directory lock and disk checks
//! - `retry` - Re-running operations that lost an optimistic commit
//! - `demo` - Scripted federation for local runs

#![allow(clippy::type_complexity)]

pub mod container;
pub mod demo;
pub mod error;
pub mod handlers;
pub mod retry;
pub mod storage;

pub use container::{ConfigError, FederationContainer, LedgerBackend, NodeConfig, RuntimePorts};
pub use error::NodeError;
pub use handlers::{EventStats, FederationEventListener};
pub use retry::retry_on_conflict;
