//! Agent question answering: tagged wire events and the resumable QA session.

pub mod model;
pub mod session;

pub use model::{ChunkAnalysisItem, ChunkProgress, QaEvent, QaRequest, ThinkingStep};
pub use session::{QaPhase, QaSession, QaState};
