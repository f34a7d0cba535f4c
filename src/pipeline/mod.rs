//! Staged candidate evaluation

pub mod gate;
pub mod state;
pub mod store;

pub use gate::{
    final_score, Application, ModelStageScorer, Pipeline, StageDetail, StageGate, StageInput, StageOutcome,
    StageScore, StageScorer, VideoEvidence,
};
pub use state::{CandidateRecord, CandidateStatus, StageState};
pub use store::{InMemoryRecordStore, JsonFileRecordStore, RecordStore};
