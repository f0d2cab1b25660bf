//! OSW Confidence Geo - Archive, geometry and GeoJSON operations
//!
//! Everything in this crate is synchronous file and geometry work. Async
//! callers are expected to run it on a blocking thread.

pub mod archive;
pub mod artifact;
pub mod assembly;
pub mod hull;
pub mod sub_regions;
pub mod validation;

pub use archive::ArchiveExtractor;
pub use assembly::ResultAssembler;
pub use hull::RegionBuilder;
pub use sub_regions::{SubRegionSplitter, SubRegions};
pub use validation::{validate_feature_collection, ValidationError, ValidationResult};
