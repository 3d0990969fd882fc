use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SkincareError {
    /// Generated text was not JSON, even after fence stripping.
    #[error("Invalid response format: {0}")]
    InvalidResponseFormat(String),

    /// Parsed JSON is missing required analysis fields.
    #[error("Invalid analysis schema: {0}")]
    InvalidAnalysisSchema(String),

    #[error("Text generation failed: {0}")]
    ServiceInvocation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Routine not found: {0}")]
    RoutineNotFound(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl SkincareError {
    /// Stable label used as the `error_kind` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SkincareError::InvalidResponseFormat(_) => "invalid_response_format",
            SkincareError::InvalidAnalysisSchema(_) => "invalid_analysis_schema",
            SkincareError::ServiceInvocation(_) => "service_invocation",
            SkincareError::Persistence(_) | SkincareError::RoutineNotFound(_) => "persistence",
            SkincareError::Config(_) => "config",
        }
    }

    /// Message shown to end users in place of an analysis.
    ///
    /// Service and storage failures share one generic message; the detail
    /// only goes to the logs.
    pub fn user_summary(&self) -> String {
        match self {
            SkincareError::InvalidResponseFormat(_) => {
                "Analysis failed: the AI response could not be read. Please try again.".to_string()
            }
            SkincareError::InvalidAnalysisSchema(_) => {
                "Analysis failed: the AI response was incomplete. Please try again.".to_string()
            }
            _ => "Analysis failed: we couldn't complete the analysis right now. Please try again later."
                .to_string(),
        }
    }
}

impl From<rusqlite::Error> for SkincareError {
    fn from(err: rusqlite::Error) -> Self {
        SkincareError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SkincareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(
            SkincareError::ServiceInvocation("x".into()).kind(),
            "service_invocation"
        );
        assert_eq!(SkincareError::Persistence("x".into()).kind(), "persistence");
        assert_eq!(SkincareError::RoutineNotFound("x".into()).kind(), "persistence");
    }

    #[test]
    fn test_service_and_persistence_share_user_summary() {
        let service = SkincareError::ServiceInvocation("timeout".into()).user_summary();
        let store = SkincareError::Persistence("disk full".into()).user_summary();
        assert_eq!(service, store);
        assert!(!service.contains("timeout"));
    }
}
