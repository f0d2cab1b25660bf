//! OSW Confidence Pipeline - Scoring orchestration
//!
//! This crate turns a prepared job workspace into a scored FeatureCollection,
//! driving the geo operations and the scoring oracle in order.

pub mod pipeline;
pub mod scoring;

pub use pipeline::ConfidencePipeline;
pub use scoring::{sub_region_file_name, ScoringCoordinator};
