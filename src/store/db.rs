use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::analyzer::types::AnalysisRecord;
use crate::error::{Result, SkincareError};
use crate::routine::{normalize_comments, Comment, RoutineRecord};

/// Columns that hold JSON documents, in table order.
const JSON_COLUMNS: [&str; 6] = [
    "day_products",
    "night_products",
    "skin_type",
    "skin_concerns",
    "climate",
    "comments",
];

/// SQLite store for shared routines (`community_builds`).
/// All operations are synchronous (rusqlite is blocking).
/// Callers in async contexts should use `tokio::task::spawn_blocking`.
pub struct RoutineDb {
    conn: Connection,
}

impl RoutineDb {
    /// Create or open the routine database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SkincareError::Persistence(format!("Failed to create data dir: {}", e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            SkincareError::Persistence(format!("Failed to open routine db at {:?}: {}", db_path, e))
        })?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS community_builds (
                shareable_id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                user_id TEXT,
                day_products TEXT NOT NULL DEFAULT '[]',
                night_products TEXT NOT NULL DEFAULT '[]',
                skin_type TEXT NOT NULL DEFAULT '[]',
                skin_concerns TEXT NOT NULL DEFAULT '[]',
                climate TEXT NOT NULL DEFAULT '[]',
                comments TEXT NOT NULL DEFAULT '[]',
                analysis TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_builds_created ON community_builds(created_at DESC);",
        )
        .map_err(|e| SkincareError::Persistence(format!("Failed to create table: {}", e)))?;

        debug!("Opened routine database at {:?}", db_path);
        Ok(Self { conn })
    }

    /// Insert a new routine. Fails if the shareable id is taken.
    pub fn insert(&self, record: &RoutineRecord) -> Result<()> {
        let analysis = record.analysis.as_ref().map(to_json).transpose()?;

        self.conn
            .execute(
                "INSERT INTO community_builds
                 (shareable_id, name, user_id, day_products, night_products, skin_type,
                  skin_concerns, climate, comments, analysis, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.shareable_id,
                    record.name,
                    record.user_id,
                    to_json(&record.day_products)?,
                    to_json(&record.night_products)?,
                    to_json(&record.skin_type)?,
                    to_json(&record.skin_concerns)?,
                    to_json(&record.climate)?,
                    to_json(&record.comments)?,
                    analysis,
                    record.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                SkincareError::Persistence(format!(
                    "Failed to insert routine {}: {}",
                    record.shareable_id, e
                ))
            })?;

        info!("Inserted routine {}", record.shareable_id);
        Ok(())
    }

    /// Fetch one routine by shareable id.
    ///
    /// The row is rebuilt as JSON and deserialized, so stored blobs go through
    /// the same normalization as imported routines (null arrays, comment shapes,
    /// legacy field names).
    pub fn fetch_one(&self, shareable_id: &str) -> Result<RoutineRecord> {
        let row = self
            .conn
            .query_row(
                "SELECT shareable_id, name, user_id, day_products, night_products, skin_type,
                        skin_concerns, climate, comments, analysis, created_at
                 FROM community_builds WHERE shareable_id = ?1",
                params![shareable_id],
                |row| {
                    let mut json_columns = Vec::with_capacity(JSON_COLUMNS.len());
                    for i in 0..JSON_COLUMNS.len() {
                        json_columns.push(row.get::<_, Option<String>>(3 + i)?);
                    }
                    Ok(StoredRow {
                        shareable_id: row.get(0)?,
                        name: row.get(1)?,
                        user_id: row.get(2)?,
                        json_columns,
                        analysis: row.get(9)?,
                        created_at: row.get(10)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| SkincareError::RoutineNotFound(shareable_id.to_string()))?;

        row.into_record()
    }

    /// Replace the stored analysis for a routine. Last write wins.
    pub fn update_analysis(&self, shareable_id: &str, record: &AnalysisRecord) -> Result<()> {
        let json = to_json(record)?;
        let updated = self
            .conn
            .execute(
                "UPDATE community_builds SET analysis = ?1 WHERE shareable_id = ?2",
                params![json, shareable_id],
            )
            .map_err(|e| {
                SkincareError::Persistence(format!(
                    "Failed to update analysis for {}: {}",
                    shareable_id, e
                ))
            })?;

        if updated == 0 {
            return Err(SkincareError::RoutineNotFound(shareable_id.to_string()));
        }

        info!("Recorded analysis for routine {}", shareable_id);
        Ok(())
    }

    /// Append a comment to a routine.
    ///
    /// Takes the write lock up front so concurrent appends queue on the busy
    /// timeout instead of failing on a lock upgrade.
    pub fn add_comment(&self, shareable_id: &str, comment: &Comment) -> Result<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let mut comments = fetch_comments(&tx, shareable_id)?;
        comments.push(comment.clone());

        tx.execute(
            "UPDATE community_builds SET comments = ?1 WHERE shareable_id = ?2",
            params![to_json(&comments)?, shareable_id],
        )?;
        tx.commit()?;

        info!(
            "Added comment {} to routine {} ({} total)",
            comment.id,
            shareable_id,
            comments.len()
        );
        Ok(())
    }

    pub fn delete(&self, shareable_id: &str) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM community_builds WHERE shareable_id = ?1",
            params![shareable_id],
        )?;

        if deleted == 0 {
            return Err(SkincareError::RoutineNotFound(shareable_id.to_string()));
        }

        info!("Deleted routine {}", shareable_id);
        Ok(())
    }
}

fn fetch_comments(conn: &Connection, shareable_id: &str) -> Result<Vec<Comment>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT comments FROM community_builds WHERE shareable_id = ?1",
            params![shareable_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| SkincareError::RoutineNotFound(shareable_id.to_string()))?;

    Ok(normalize_comments(parse_column("comments", raw)?))
}

/// Raw column values of one `community_builds` row.
struct StoredRow {
    shareable_id: String,
    name: String,
    user_id: Option<String>,
    json_columns: Vec<Option<String>>,
    analysis: Option<String>,
    created_at: String,
}

impl StoredRow {
    fn into_record(self) -> Result<RoutineRecord> {
        let mut map = Map::new();
        map.insert("shareable_id".into(), Value::String(self.shareable_id.clone()));
        map.insert("name".into(), Value::String(self.name));
        if let Some(user_id) = self.user_id {
            map.insert("user_id".into(), Value::String(user_id));
        }
        for (column, raw) in JSON_COLUMNS.iter().zip(self.json_columns) {
            map.insert((*column).into(), parse_column(column, raw)?);
        }
        map.insert("created_at".into(), Value::String(self.created_at));

        let mut record: RoutineRecord = serde_json::from_value(Value::Object(map)).map_err(|e| {
            SkincareError::Persistence(format!(
                "Corrupt routine row {}: {}",
                self.shareable_id, e
            ))
        })?;

        // An unreadable analysis slot reads as empty; the next analysis overwrites it.
        record.analysis = self.analysis.and_then(|raw| {
            serde_json::from_str::<AnalysisRecord>(&raw)
                .map_err(|e| {
                    warn!(
                        "Ignoring unreadable analysis for routine {}: {}",
                        self.shareable_id, e
                    )
                })
                .ok()
        });
        Ok(record)
    }
}

fn parse_column(column: &str, raw: Option<String>) -> Result<Value> {
    match raw {
        None => Ok(Value::Null),
        Some(text) => serde_json::from_str(&text).map_err(|e| {
            SkincareError::Persistence(format!("Invalid JSON in column {}: {}", column, e))
        }),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| SkincareError::Persistence(format!("Failed to serialize: {}", e)))
}
