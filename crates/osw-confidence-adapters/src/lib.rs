//! OSW Confidence Adapters - Port implementations
//!
//! In-memory bus and storage for development and tests, a local directory
//! storage, and HTTP clients for remote storage and the scoring oracle.

pub mod blob;
pub mod file;
pub mod http;
pub mod memory;

pub use file::FileBlobStorage;
pub use http::{HttpBlobStorage, HttpScoringOracle};
pub use memory::{MemoryBlobStorage, MemoryBus};
