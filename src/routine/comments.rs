//! Normalization of stored comment blobs.
//!
//! Older rows hold comments as an array, as an object keyed by comment id,
//! as a single bare comment object, or as `null`. Everything downstream sees
//! one ordered `Vec<Comment>`; the shape juggling happens only here.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

use super::types::Comment;

/// Serde adapter for the `comments` field of a routine row.
pub(crate) fn deserialize_comments<'de, D>(deserializer: D) -> Result<Vec<Comment>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_comments(value))
}

/// Convert any stored comment shape into the canonical ordered sequence.
///
/// Arrays keep their stored order. Keyed objects are ordered by `created_at`,
/// then by id. Entries that don't parse as a comment are dropped.
pub fn normalize_comments(value: Value) -> Vec<Comment> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| parse_comment(item, None))
            .collect(),
        Value::Object(map) if is_bare_comment(&map) => {
            parse_comment(Value::Object(map), None).into_iter().collect()
        }
        Value::Object(map) => {
            let mut comments: Vec<Comment> = map
                .into_iter()
                .filter_map(|(key, item)| parse_comment(item, Some(&key)))
                .collect();
            comments.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });
            comments
        }
        other => {
            warn!("Ignoring comments of unexpected JSON type: {}", other);
            Vec::new()
        }
    }
}

fn is_bare_comment(map: &Map<String, Value>) -> bool {
    map.get("text").is_some_and(Value::is_string)
}

fn parse_comment(value: Value, key: Option<&str>) -> Option<Comment> {
    let mut comment: Comment = match serde_json::from_value(value) {
        Ok(comment) => comment,
        Err(e) => {
            warn!("Dropping malformed comment {:?}: {}", key, e);
            return None;
        }
    };

    if comment.id.is_empty() {
        match key {
            Some(key) => comment.id = key.to_string(),
            None => {
                warn!("Dropping comment without an id");
                return None;
            }
        }
    }

    Some(comment)
}
