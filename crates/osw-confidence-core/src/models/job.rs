use std::fmt;

/// Stage of a job inside the intake service
///
/// Any failure jumps straight to `Responding`; there is no retry stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Received,
    Downloading,
    Extracting,
    Scoring,
    Assembling,
    Responding,
    Done,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Received => "received",
            JobStage::Downloading => "downloading",
            JobStage::Extracting => "extracting",
            JobStage::Scoring => "scoring",
            JobStage::Assembling => "assembling",
            JobStage::Responding => "responding",
            JobStage::Done => "done",
        };
        f.write_str(name)
    }
}
