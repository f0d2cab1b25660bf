pub mod credentials;
pub mod job;
pub mod message;
pub mod region;
pub mod request;
pub mod response;

pub use credentials::Credentials;
pub use job::JobStage;
pub use message::QueueMessage;
pub use region::{
    geometry_type_name, ExtractedArchive, RegionScores, ScoredSubRegion, SubRegion,
    CONFIDENCE_SCORE_PROPERTY,
};
pub use request::{recover_job_id, ConfidenceRequest, RequestData};
pub use response::{ConfidenceResponse, JobStatus, ResponseData};
