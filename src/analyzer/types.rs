//! Type definitions for AI routine analysis.
//!
//! Field names follow the JSON the model is asked to produce, so these
//! types deserialize the validated response directly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::routine::{Product, RoutineSnapshot};

/// Structured critique of a routine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutineAnalysis {
    pub summary: String,
    pub routine_analysis: RoutineBreakdown,
    pub skin_profile: SkinProfileAnalysis,
    pub recommendations: Recommendations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scientific_sources: Option<Vec<ScientificSource>>,
}

impl RoutineAnalysis {
    /// Placeholder analysis shown when a run fails. Only `summary` carries content.
    pub fn failure(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }
}

/// Per-step product commentary for the morning and evening routines.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoutineBreakdown {
    pub day_products: ProductSection,
    pub night_products: ProductSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductSection {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkinProfileAnalysis {
    /// Keyed by skin type label
    pub skin_type_analysis: BTreeMap<String, String>,
    /// Keyed by concern label
    pub concerns_analysis: BTreeMap<String, String>,
    pub climate_considerations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub general: Vec<String>,
    pub product_interactions: Vec<String>,
    pub missing_products: Vec<String>,
    pub order_suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScientificSource {
    pub citation: String,
    pub key_findings: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Persisted result of one analysis run, with the snapshot it was based on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// Creation time, serialized as RFC 3339
    pub timestamp: DateTime<Utc>,
    pub routine_snapshot: RoutineSnapshot,
    pub analysis: RoutineAnalysis,
}

impl AnalysisRecord {
    pub fn new(routine_snapshot: RoutineSnapshot, analysis: RoutineAnalysis) -> Self {
        Self {
            timestamp: Utc::now(),
            routine_snapshot,
            analysis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_deserialize_camel_case() {
        let json = r#"{
            "summary": "Solid basics",
            "routineAnalysis": {
                "day_products": {"products": [], "recommendations": ["Add SPF"]},
                "night_products": {}
            },
            "skinProfile": {
                "skinTypeAnalysis": {"dry": "Needs occlusives"},
                "concernsAnalysis": {},
                "climateConsiderations": ["Humidifier in winter"]
            },
            "recommendations": {
                "general": ["Patch test"],
                "productInteractions": [],
                "missingProducts": ["Sunscreen"],
                "orderSuggestions": []
            },
            "scientificSources": [
                {"citation": "Draelos 2018", "keyFindings": "Ceramides help", "doi": "10.1/x"}
            ]
        }"#;

        let analysis: RoutineAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.summary, "Solid basics");
        assert_eq!(
            analysis.routine_analysis.day_products.recommendations,
            vec!["Add SPF"]
        );
        assert!(analysis.routine_analysis.night_products.products.is_empty());
        assert_eq!(
            analysis.skin_profile.skin_type_analysis.get("dry"),
            Some(&"Needs occlusives".to_string())
        );
        assert_eq!(analysis.recommendations.missing_products, vec!["Sunscreen"]);

        let sources = analysis.scientific_sources.unwrap();
        assert_eq!(sources[0].key_findings, "Ceramides help");
        assert_eq!(sources[0].doi.as_deref(), Some("10.1/x"));
        assert!(sources[0].link.is_none());
    }

    #[test]
    fn test_failure_analysis_is_empty_apart_from_summary() {
        let analysis = RoutineAnalysis::failure("Analysis failed");
        assert_eq!(analysis.summary, "Analysis failed");
        assert!(analysis.recommendations.general.is_empty());
        assert!(analysis.skin_profile.skin_type_analysis.is_empty());
        assert!(analysis.scientific_sources.is_none());
    }

    #[test]
    fn test_record_serializes_wire_names() {
        let record = AnalysisRecord::new(RoutineSnapshot::default(), RoutineAnalysis::failure("x"));
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("routineSnapshot").is_some());
        assert!(json["analysis"].get("routineAnalysis").is_some());
        assert!(json["analysis"].get("scientificSources").is_none());

        let timestamp = json["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    }
}
