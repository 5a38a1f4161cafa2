//! sandbox-bootstrap - prepares an isolated interpreter sandbox
//!
//! This crate provides:
//! - Source tree discovery and materialization into a sandbox filesystem
//! - Transport encoding for script-driven sandboxes
//! - A raw-mode line editor that bridges the host terminal to the sandbox
//! - An output relay for sandbox-produced text

pub mod bootstrap;
pub mod bridge;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod materialize;
pub mod paths;
pub mod sandbox;
pub mod transport;

pub use config::Config;
pub use error::{BootstrapError, Result};
