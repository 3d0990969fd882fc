//! AI routine analysis: change detection, prompting, response validation and
//! the run state machine that ties them together.

pub mod change;
pub mod orchestrator;
pub mod prompts;
pub mod types;
pub mod validation;

pub use change::{diff_snapshots, has_changed};
pub use orchestrator::{AnalysisRun, AnalysisState, RoutineAnalyzer};
pub use prompts::build_routine_analysis_prompt;
pub use types::*;
pub use validation::validate_analysis_response;
