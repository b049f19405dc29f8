//! Progressive file search: wire models and the search session state machine.

pub mod model;
pub mod session;

pub use model::{Hit, SearchRequest, SearchResponse, Stage, StageEvent};
pub use session::{FirstSeenIndex, SearchPhase, SearchSession, SearchState};
