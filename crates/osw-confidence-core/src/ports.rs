//! Port trait definitions
//!
//! These traits define the interfaces that adapters must implement.

pub mod bus;
pub mod scoring;
pub mod storage;

pub use bus::{MessageBus, Subscription};
pub use scoring::ScoringOracle;
pub use storage::BlobStorage;
