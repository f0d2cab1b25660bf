//! Simulate mode
//!
//! Jobs answer with a fixed FeatureCollection instead of downloading and
//! scoring anything.

use async_trait::async_trait;
use geojson::FeatureCollection;
use std::path::Path;

use osw_confidence_core::error::Result;
use osw_confidence_core::models::Credentials;
use osw_confidence_core::ports::ScoringOracle;

const SIMULATED_RESULT: &str = include_str!("../data/simulated_result.geojson");

/// Score carried by the canned result
pub const SIMULATED_SCORE: f64 = 0.75;

pub const SIMULATED_LIBRARY_VERSION: &str = "simulated";

/// The canned result returned for every simulated job
pub fn simulated_scores() -> Result<FeatureCollection> {
    Ok(serde_json::from_str(SIMULATED_RESULT)?)
}

/// Oracle used when no scoring service is configured in simulate mode
pub struct SimulatedOracle;

#[async_trait]
impl ScoringOracle for SimulatedOracle {
    async fn score(&self, _region_file: &Path, _credentials: &Credentials) -> Result<f64> {
        Ok(SIMULATED_SCORE)
    }

    fn library_version(&self) -> &str {
        SIMULATED_LIBRARY_VERSION
    }
}
