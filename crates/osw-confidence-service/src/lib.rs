//! OSW Confidence Service - Job intake, HTTP surface and wiring
//!
//! The intake service listens on the request topic, runs one supervised task
//! per accepted job and publishes exactly one response for each of them.

pub mod active;
pub mod dedup;
pub mod error;
pub mod intake;
pub mod routes;
pub mod simulate;
pub mod state;

pub use intake::JobIntakeService;
pub use routes::create_router;
pub use state::AppState;
