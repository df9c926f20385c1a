pub mod location;
pub mod pipeline;
pub mod scoring;
pub mod skills;

pub use pipeline::{
    BatchError, CandidateBatchOptions, CandidateBatchStats, FleetBatchOptions, FleetBatchStats,
    JobCatalog, MatchPipeline, ProfileReader,
};
pub use scoring::{score, MatchClass, ScoredMatch, Weights, DETAILED_WEIGHTS};
