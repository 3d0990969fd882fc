//! Validation of generated analysis text.
//!
//! The model is told to answer with bare JSON but some providers still wrap
//! it in a markdown fence, so the fence is stripped before parsing. The parsed
//! object is then checked structurally before it is trusted as an analysis.

use serde_json::Value;
use tracing::error;

use super::types::RoutineAnalysis;
use crate::error::{Result, SkincareError};

const FENCE: &str = "```";

/// Return the content of the first fenced code block, or `text` unchanged.
///
/// The opening fence may carry a `json` tag. Without a closing fence there
/// is no complete block and the text is returned as-is.
pub fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find(FENCE) else {
        return text;
    };
    let after_open = &text[open + FENCE.len()..];
    let body = after_open.strip_prefix("json").unwrap_or(after_open);

    match body.find(FENCE) {
        Some(close) => body[..close].trim(),
        None => text,
    }
}

/// Parse raw generated text into a JSON value.
pub fn parse_response(raw: &str) -> Result<Value> {
    let text = strip_code_fence(raw);
    serde_json::from_str(text).map_err(|e| {
        let truncated: String = raw.chars().take(500).collect();
        error!(
            "Failed to parse analysis response as JSON: {}. Raw response (first 500 chars): {}",
            e, truncated
        );
        SkincareError::InvalidResponseFormat(e.to_string())
    })
}

/// Check the parsed value for every field the analysis requires.
///
/// Returns the dotted paths of all failures, empty when the value is valid.
pub fn schema_violations(value: &Value) -> Vec<String> {
    let mut violations = Vec::new();

    let mut require = |path: &str, ok: fn(&Value) -> bool, expected: &str| {
        let found = path.split('.').try_fold(value, |current, key| current.get(key));
        if !found.is_some_and(ok) {
            violations.push(format!("{} must be {}", path, expected));
        }
    };

    require("summary", Value::is_string, "a string");
    require("routineAnalysis.day_products", Value::is_object, "an object");
    require("routineAnalysis.night_products", Value::is_object, "an object");
    require("skinProfile.skinTypeAnalysis", |v| !v.is_null(), "present");
    require("skinProfile.concernsAnalysis", |v| !v.is_null(), "present");
    require("skinProfile.climateConsiderations", |v| !v.is_null(), "present");
    require("recommendations.general", Value::is_array, "an array");
    require("recommendations.productInteractions", Value::is_array, "an array");
    require("recommendations.missingProducts", Value::is_array, "an array");
    require("recommendations.orderSuggestions", Value::is_array, "an array");

    violations
}

/// Validate raw generated text and convert it into a typed analysis.
///
/// # Errors
/// - `InvalidResponseFormat` if the (fence-stripped) text is not JSON
/// - `InvalidAnalysisSchema` if required fields are missing or mistyped
pub fn validate_analysis_response(raw: &str) -> Result<RoutineAnalysis> {
    let value = parse_response(raw)?;

    let violations = schema_violations(&value);
    if !violations.is_empty() {
        let msg = violations.join("; ");
        error!("Analysis response failed schema validation: {}", msg);
        return Err(SkincareError::InvalidAnalysisSchema(msg));
    }

    serde_json::from_value(value).map_err(|e| {
        error!("Analysis response does not match RoutineAnalysis: {}", e);
        SkincareError::InvalidAnalysisSchema(e.to_string())
    })
}
