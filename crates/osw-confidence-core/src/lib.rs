//! OSW Confidence Core - Domain models, ports, configuration and job workspace
//!
//! This crate contains the message schema, the port traits the pipeline talks
//! through, and the per-job filesystem area shared by every other crate.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;
pub mod workspace;

pub use config::ServiceConfig;
pub use error::{ConfidenceError, Result};
pub use workspace::JobWorkspace;
