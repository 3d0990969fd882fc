//! Routine, product and comment types shared by the store and the analyzer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::comments::deserialize_comments;
use crate::analyzer::types::AnalysisRecord;

/// Treat an explicit JSON `null` the same as an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A skincare product as it appears in a routine step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub brand: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Product category (cleanser, serum, sunscreen, ...)
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub product_type: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ingredients: Vec<String>,
}

impl Product {
    /// Identity used for change detection. Ingredients are not part of it.
    pub fn same_identity(&self, other: &Product) -> bool {
        self.id == other.id
            && self.brand == other.brand
            && self.name == other.name
            && self.product_type == other.product_type
    }
}

/// Immutable copy of the routine inputs that drove an analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutineSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub day_products: Vec<Product>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub night_products: Vec<Product>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skin_type: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skin_concerns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub climate: Vec<String>,
}

/// A user comment on a shared routine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        avatar_url: Option<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_comment_id(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            avatar_url,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// One row of the `community_builds` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "RoutineRow")]
pub struct RoutineRecord {
    pub shareable_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub day_products: Vec<Product>,
    pub night_products: Vec<Product>,
    pub skin_type: Vec<String>,
    pub skin_concerns: Vec<String>,
    pub climate: Vec<String>,
    pub comments: Vec<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisRecord>,
    pub created_at: DateTime<Utc>,
}

/// Incoming row shape. Older exports keep the analysis under
/// `analysis_notes`, often next to a null `analysis`.
#[derive(Deserialize)]
struct RoutineRow {
    #[serde(default)]
    shareable_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    day_products: Vec<Product>,
    #[serde(default, deserialize_with = "null_as_default")]
    night_products: Vec<Product>,
    #[serde(default, deserialize_with = "null_as_default")]
    skin_type: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    skin_concerns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    climate: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_comments")]
    comments: Vec<Comment>,
    #[serde(default)]
    analysis: Option<AnalysisRecord>,
    #[serde(default)]
    analysis_notes: Option<AnalysisRecord>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

impl From<RoutineRow> for RoutineRecord {
    fn from(row: RoutineRow) -> Self {
        Self {
            shareable_id: row.shareable_id,
            name: row.name,
            user_id: row.user_id,
            day_products: row.day_products,
            night_products: row.night_products,
            skin_type: row.skin_type,
            skin_concerns: row.skin_concerns,
            climate: row.climate,
            comments: row.comments,
            // `analysis` wins when both slots are filled
            analysis: row.analysis.or(row.analysis_notes),
            created_at: row.created_at,
        }
    }
}

impl RoutineRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shareable_id: generate_shareable_id(),
            name: name.into(),
            user_id: None,
            day_products: Vec::new(),
            night_products: Vec::new(),
            skin_type: Vec::new(),
            skin_concerns: Vec::new(),
            climate: Vec::new(),
            comments: Vec::new(),
            analysis: None,
            created_at: Utc::now(),
        }
    }

    /// Copy the current routine state into a fresh snapshot.
    pub fn snapshot(&self) -> RoutineSnapshot {
        RoutineSnapshot {
            day_products: self.day_products.clone(),
            night_products: self.night_products.clone(),
            skin_type: self.skin_type.clone(),
            skin_concerns: self.skin_concerns.clone(),
            climate: self.climate.clone(),
        }
    }

    /// Snapshot embedded in the last analysis, if any.
    pub fn previous_snapshot(&self) -> Option<&RoutineSnapshot> {
        self.analysis.as_ref().map(|record| &record.routine_snapshot)
    }
}

/// Generate a public routine id: 12 lowercase hex chars.
pub fn generate_shareable_id() -> String {
    let bytes: [u8; 6] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generate a comment id: "c" + 12 hex chars.
pub fn generate_comment_id() -> String {
    let bytes: [u8; 6] = rand::random();
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("c{}", hex)
}
