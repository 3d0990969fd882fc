//! Routine analysis runs.
//!
//! A run moves through `Idle -> [AwaitingConfirmation] -> Analyzing ->
//! Completed | Failed`. Re-analyzing a routine that hasn't changed since its
//! last analysis stops at `AwaitingConfirmation` until the caller confirms,
//! so no generation call is made without an explicit second request.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::change::{diff_snapshots, has_changed};
use super::prompts::build_routine_analysis_prompt;
use super::types::{AnalysisRecord, RoutineAnalysis};
use super::validation::validate_analysis_response;
use crate::error::{Result, SkincareError};
use crate::llm::{GenerationRequest, TextGenerator, ROUTINE_ANALYSIS_CONFIG};
use crate::routine::RoutineRecord;
use crate::store::RoutineStore;

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisState {
    Idle,
    /// The routine matches its last analysis; re-running needs confirmation.
    AwaitingConfirmation { last_analyzed: DateTime<Utc> },
    Analyzing,
    Completed { analysis: RoutineAnalysis },
    /// `analysis` is the user-facing failure placeholder, not model output.
    Failed {
        error: SkincareError,
        analysis: RoutineAnalysis,
    },
}

impl AnalysisState {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisState::Idle => "idle",
            AnalysisState::AwaitingConfirmation { .. } => "awaiting_confirmation",
            AnalysisState::Analyzing => "analyzing",
            AnalysisState::Completed { .. } => "completed",
            AnalysisState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisState::Completed { .. } | AnalysisState::Failed { .. }
        )
    }

    /// Analysis to show the user: the result on success, the failure
    /// placeholder on failure, nothing otherwise.
    pub fn analysis(&self) -> Option<&RoutineAnalysis> {
        match self {
            AnalysisState::Completed { analysis } | AnalysisState::Failed { analysis, .. } => {
                Some(analysis)
            }
            _ => None,
        }
    }
}

/// Runs routine analyses against an explicitly supplied store and generator.
pub struct RoutineAnalyzer<S, G> {
    store: S,
    generator: G,
}

impl<S: RoutineStore, G: TextGenerator> RoutineAnalyzer<S, G> {
    pub fn new(store: S, generator: G) -> Self {
        Self { store, generator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Start a new run for a routine, in `Idle`.
    pub fn begin(&self, shareable_id: impl Into<String>) -> AnalysisRun<'_, S, G> {
        AnalysisRun {
            analyzer: self,
            shareable_id: shareable_id.into(),
            routine: None,
            state: AnalysisState::Idle,
        }
    }

    /// Request an analysis and, when `confirmed` is set, pass the
    /// re-analysis gate in the same call.
    pub async fn analyze(&self, shareable_id: &str, confirmed: bool) -> AnalysisState {
        let mut run = self.begin(shareable_id);
        run.request().await;
        if confirmed && matches!(run.state(), AnalysisState::AwaitingConfirmation { .. }) {
            run.confirm().await;
        }
        run.into_state()
    }

    /// Snapshot, prompt, generate, validate, persist.
    async fn perform(&self, shareable_id: &str, routine: &RoutineRecord) -> Result<RoutineAnalysis> {
        let snapshot = routine.snapshot();
        let prompt = build_routine_analysis_prompt(&snapshot);
        let request = GenerationRequest::new(prompt, ROUTINE_ANALYSIS_CONFIG);

        let raw = self.generator.generate(&request).await?;
        let analysis = validate_analysis_response(&raw)?;

        let record = AnalysisRecord::new(snapshot, analysis.clone());
        self.store.update_analysis(shareable_id, &record).await?;

        info!(
            "Analysis complete for routine {}: {} general, {} interaction, {} missing-product recommendations",
            shareable_id,
            analysis.recommendations.general.len(),
            analysis.recommendations.product_interactions.len(),
            analysis.recommendations.missing_products.len()
        );
        Ok(analysis)
    }
}

/// One user-initiated analysis of one routine.
pub struct AnalysisRun<'a, S, G> {
    analyzer: &'a RoutineAnalyzer<S, G>,
    shareable_id: String,
    /// Routine fetched by `request`, held while awaiting confirmation
    routine: Option<RoutineRecord>,
    state: AnalysisState,
}

impl<S: RoutineStore, G: TextGenerator> AnalysisRun<'_, S, G> {
    pub fn shareable_id(&self) -> &str {
        &self.shareable_id
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn into_state(self) -> AnalysisState {
        self.state
    }

    /// Explicit analysis request. Only valid from `Idle`.
    pub async fn request(&mut self) -> &AnalysisState {
        if self.state != AnalysisState::Idle {
            warn!(
                "Ignoring analysis request for routine {} in state {}",
                self.shareable_id,
                self.state.name()
            );
            return &self.state;
        }

        let routine = match self.analyzer.store.fetch_one(&self.shareable_id).await {
            Ok(routine) => routine,
            Err(e) => {
                self.fail(e);
                return &self.state;
            }
        };

        let current = routine.snapshot();
        if has_changed(&current, routine.previous_snapshot()) {
            match routine.previous_snapshot() {
                Some(previous) => info!(
                    "Routine {} changed since last analysis: {}",
                    self.shareable_id,
                    diff_snapshots(&current, previous).join(", ")
                ),
                None => info!("Routine {} has no previous analysis", self.shareable_id),
            }
            self.run_analysis(routine).await;
        } else if let Some(previous) = &routine.analysis {
            info!(
                "Routine {} unchanged since analysis at {}, awaiting confirmation",
                self.shareable_id,
                previous.timestamp.to_rfc3339()
            );
            self.state = AnalysisState::AwaitingConfirmation {
                last_analyzed: previous.timestamp,
            };
            self.routine = Some(routine);
        }

        &self.state
    }

    /// Confirm a re-analysis of an unchanged routine. Only valid from
    /// `AwaitingConfirmation`.
    pub async fn confirm(&mut self) -> &AnalysisState {
        let routine = match (&self.state, self.routine.take()) {
            (AnalysisState::AwaitingConfirmation { .. }, Some(routine)) => routine,
            (_, routine) => {
                self.routine = routine;
                warn!(
                    "Ignoring confirmation for routine {} in state {}",
                    self.shareable_id,
                    self.state.name()
                );
                return &self.state;
            }
        };

        info!("Re-analysis confirmed for routine {}", self.shareable_id);
        self.run_analysis(routine).await;
        &self.state
    }

    async fn run_analysis(&mut self, routine: RoutineRecord) {
        self.state = AnalysisState::Analyzing;
        match self.analyzer.perform(&self.shareable_id, &routine).await {
            Ok(analysis) => self.state = AnalysisState::Completed { analysis },
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: SkincareError) {
        error!(
            error_kind = error.kind(),
            routine = %self.shareable_id,
            "Routine analysis failed: {}",
            error
        );
        self.state = AnalysisState::Failed {
            analysis: RoutineAnalysis::failure(error.user_summary()),
            error,
        };
    }
}
