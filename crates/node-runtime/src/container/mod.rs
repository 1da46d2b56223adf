//! # Federation Container
//!
//! Configuration plus the container holding every wired subsystem.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, LedgerBackend, NodeConfig};
pub use subsystems::{FederationContainer, RuntimePorts};
