pub mod analyzer;
pub mod config;
pub mod error;
pub mod llm;
pub mod routine;
pub mod store;

pub use analyzer::{AnalysisRecord, AnalysisRun, AnalysisState, RoutineAnalysis, RoutineAnalyzer};
pub use config::AppConfig;
pub use error::{Result, SkincareError};
pub use llm::{GenerationConfig, GenerationRequest, LlmClient, Provider, TextGenerator};
pub use routine::{Comment, Product, RoutineRecord, RoutineSnapshot};
pub use store::{RoutineStore, SqliteRoutineStore};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
